//! Column extraction rules.
//!
//! A [`ColumnRule`] produces one value per output row. It carries an ordered
//! list of fallback selector queries and knows how to turn a matched node
//! into a cell value, either its visible text or one of its attributes.

use std::fmt;
use std::str::FromStr;

use crate::error::AppError;
use crate::traits::{PageIndex, PageNode};

/// Separator between fallback queries in the textual rule syntax.
///
/// CSS selector lists already use `,`, so fallbacks need their own token.
pub const FALLBACK_SEPARATOR: &str = "||";

/// Attributes whose values are links and get resolved against the page URL.
const URL_ATTRIBUTES: [&str; 2] = ["href", "src"];

/// What a rule pulls out of a matched node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleKind {
    /// The node's visible text, trimmed at both ends.
    Text,
    /// The value of the named attribute.
    Attribute { name: String },
}

/// One column of the output table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRule {
    kind: RuleKind,
    queries: Vec<String>,
}

impl ColumnRule {
    /// Build a rule extracting visible text.
    pub fn text<I, S>(queries: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Self {
            kind: RuleKind::Text,
            queries: validate_queries(queries)?,
        })
    }

    /// Build a rule extracting the attribute `name`.
    pub fn attribute<I, S>(name: impl Into<String>, queries: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(AppError::InvalidRule(
                "attribute name must not be empty".into(),
            ));
        }
        Ok(Self {
            kind: RuleKind::Attribute { name },
            queries: validate_queries(queries)?,
        })
    }

    pub fn kind(&self) -> &RuleKind {
        &self.kind
    }

    /// Fallback queries, in the order they are tried.
    pub fn queries(&self) -> &[String] {
        &self.queries
    }

    pub fn attribute_name(&self) -> Option<&str> {
        match &self.kind {
            RuleKind::Text => None,
            RuleKind::Attribute { name } => Some(name),
        }
    }

    /// True when extracted values are links to resolve against the page URL.
    pub fn needs_url_resolution(&self) -> bool {
        self.attribute_name()
            .is_some_and(|name| URL_ATTRIBUTES.iter().any(|a| a.eq_ignore_ascii_case(name)))
    }

    /// Nodes matched by the first fallback query that matches anything.
    ///
    /// Queries after the first successful one are never run against the page.
    /// Returns an empty list when no query matches.
    pub fn find_matches<'p, P: PageIndex>(
        &self,
        page: &'p P,
    ) -> Result<Vec<P::Node<'p>>, AppError> {
        for query in &self.queries {
            let nodes = page.query(query)?;
            if !nodes.is_empty() {
                tracing::debug!(%query, matches = nodes.len(), "Selector matched");
                return Ok(nodes);
            }
            tracing::debug!(%query, "Selector matched nothing, trying next fallback");
        }
        Ok(Vec::new())
    }

    /// Cell value for `node`, or `None` if there is no node or no value.
    pub fn extract<N: PageNode>(&self, node: Option<&N>) -> Option<String> {
        let node = node?;
        match &self.kind {
            RuleKind::Text => Some(node.text().trim().to_string()),
            RuleKind::Attribute { name } => node.attribute(name),
        }
    }
}

fn validate_queries<I, S>(queries: I) -> Result<Vec<String>, AppError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let queries: Vec<String> = queries.into_iter().map(Into::into).collect();
    if queries.is_empty() {
        return Err(AppError::InvalidRule(
            "at least one selector query must be provided".into(),
        ));
    }
    if let Some(pos) = queries.iter().position(|q| q.trim().is_empty()) {
        return Err(AppError::InvalidRule(format!(
            "selector query #{} is blank",
            pos + 1
        )));
    }
    Ok(queries)
}

impl fmt::Display for ColumnRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let queries = self.queries.join(&format!(" {FALLBACK_SEPARATOR} "));
        match &self.kind {
            RuleKind::Text => write!(f, "text:{queries}"),
            RuleKind::Attribute { name } => write!(f, "attr:{name}:{queries}"),
        }
    }
}

/// Parses the CLI column syntax.
///
/// - `text:h3 > a || h3`
/// - `attr:href:a.more || a`
impl FromStr for ColumnRule {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, rest) = s.split_once(':').ok_or_else(|| {
            AppError::InvalidRule(format!(
                "expected 'text:<selector>' or 'attr:<name>:<selector>', got: {s}"
            ))
        })?;

        match prefix.trim().to_lowercase().as_str() {
            "text" => ColumnRule::text(split_fallbacks(rest)),
            "attr" | "attribute" => {
                let (name, queries) = rest.split_once(':').ok_or_else(|| {
                    AppError::InvalidRule(format!(
                        "attribute rule must be 'attr:<name>:<selector>', got: {s}"
                    ))
                })?;
                ColumnRule::attribute(name.trim(), split_fallbacks(queries))
            }
            other => Err(AppError::InvalidRule(format!(
                "unknown rule type '{other}' (expected 'text' or 'attr')"
            ))),
        }
    }
}

fn split_fallbacks(s: &str) -> Vec<String> {
    if s.trim().is_empty() {
        return Vec::new();
    }
    s.split(FALLBACK_SEPARATOR)
        .map(|q| q.trim().to_string())
        .collect()
}
