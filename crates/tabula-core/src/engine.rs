//! Column selection and row alignment.
//!
//! Every rule is matched against the page on its own; the per-column node
//! lists are then zipped positionally into rows. Alignment truncates to the
//! shortest list: a column with fewer matches drops the trailing rows of
//! every other column. Callers that need equal lengths must check the
//! counts returned by [`select`] themselves.

use url::Url;

use crate::error::AppError;
use crate::models::{Row, RowSet};
use crate::rule::ColumnRule;
use crate::traits::{PageIndex, PageNode};

/// Run every rule against `page`, returning one node list per rule in rule order.
pub fn select<'p, P: PageIndex>(
    page: &'p P,
    rules: &[ColumnRule],
) -> Result<Vec<Vec<P::Node<'p>>>, AppError> {
    rules.iter().map(|rule| rule.find_matches(page)).collect()
}

/// Zip per-column node lists into rows and extract cell values.
///
/// Link attributes (`href`, `src`) are resolved against `base_url`.
pub fn align_and_extract<N: PageNode>(
    match_lists: &[Vec<N>],
    rules: &[ColumnRule],
    base_url: &str,
) -> Result<RowSet, AppError> {
    if match_lists.len() != rules.len() {
        return Err(AppError::ExtractionError(format!(
            "got {} match lists for {} rules",
            match_lists.len(),
            rules.len()
        )));
    }

    let row_count = match_lists.iter().map(Vec::len).min().unwrap_or(0);
    let base = Url::parse(base_url).ok();
    if base.is_none() {
        tracing::debug!(%base_url, "Base URL is not absolute, links are kept as-is");
    }

    let rows = (0..row_count)
        .map(|i| {
            rules
                .iter()
                .zip(match_lists)
                .map(|(rule, nodes)| extract_cell(rule, nodes.get(i), base.as_ref()))
                .collect::<Row>()
        })
        .collect();

    Ok(RowSet::new(rows))
}

/// [`select`] followed by [`align_and_extract`].
pub fn extract_rows<P: PageIndex>(
    page: &P,
    rules: &[ColumnRule],
    base_url: &str,
) -> Result<RowSet, AppError> {
    let match_lists = select(page, rules)?;
    align_and_extract(&match_lists, rules, base_url)
}

/// Number of rows kept when column match counts disagree, `None` when they agree.
pub fn truncation(counts: &[usize]) -> Option<usize> {
    let min = counts.iter().copied().min()?;
    let max = counts.iter().copied().max()?;
    (min != max).then_some(min)
}

/// Resolve `value` against `base_url` the way a browser resolves a link.
///
/// Absolute values come back untouched, as does anything that cannot be joined.
pub fn resolve_url(base_url: &str, value: &str) -> String {
    match Url::parse(base_url) {
        Ok(base) => join_url(&base, value),
        Err(_) => value.to_string(),
    }
}

fn join_url(base: &Url, value: &str) -> String {
    if Url::parse(value).is_ok() {
        return value.to_string();
    }
    match base.join(value) {
        Ok(joined) => joined.to_string(),
        Err(e) => {
            tracing::debug!(%value, error = %e, "Could not resolve link");
            value.to_string()
        }
    }
}

fn extract_cell<N: PageNode>(rule: &ColumnRule, node: Option<&N>, base: Option<&Url>) -> Option<String> {
    let value = rule.extract(node)?;
    match base {
        Some(base) if rule.needs_url_resolution() && !value.is_empty() => {
            Some(join_url(base, &value))
        }
        _ => Some(value),
    }
}
