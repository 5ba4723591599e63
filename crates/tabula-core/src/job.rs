use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::rule::ColumnRule;
use crate::sink::OutputFormat;

/// Lifecycle of a job on a runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Idle,
    Running,
    Completed,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Idle => "idle",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "idle" => Ok(JobState::Idle),
            "running" => Ok(JobState::Running),
            "completed" => Ok(JobState::Completed),
            "failed" => Ok(JobState::Failed),
            _ => Err(format!("Unknown job state: {}", s)),
        }
    }
}

/// One scrape request. Read-only once built.
#[derive(Debug, Clone)]
pub struct Job {
    id: Uuid,
    url: String,
    rules: Vec<ColumnRule>,
    output_format: OutputFormat,
    created_at: DateTime<Utc>,
}

impl Job {
    /// Fails with [`AppError::InvalidJob`] when `rules` is empty or `url` is blank.
    pub fn new(
        url: impl Into<String>,
        rules: Vec<ColumnRule>,
        output_format: OutputFormat,
    ) -> Result<Self, AppError> {
        let url = url.into().trim().to_string();
        if url.is_empty() {
            return Err(AppError::InvalidJob("URL must not be empty".into()));
        }
        if rules.is_empty() {
            return Err(AppError::InvalidJob(
                "at least one column rule is required".into(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            url,
            rules,
            output_format,
            created_at: Utc::now(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn rules(&self) -> &[ColumnRule] {
        &self.rules
    }

    pub fn output_format(&self) -> OutputFormat {
        self.output_format
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Serializable job description, as handed over by a front end.
///
/// ```json
/// {
///   "url": "https://books.toscrape.com/",
///   "selectors": [
///     { "selector": "h3 > a", "type": "text" },
///     { "selector": ["h3 > a", "a"], "type": "attribute", "attribute_name": "href" }
///   ],
///   "save_format": "csv"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    pub url: String,
    pub selectors: Vec<SelectorSpec>,
    #[serde(default = "default_save_format")]
    pub save_format: String,
}

/// One column of a [`JobSpec`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorSpec {
    /// A single query or an ordered list of fallbacks.
    pub selector: QueryList,
    #[serde(rename = "type", default)]
    pub kind: SelectorType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryList {
    One(String),
    Many(Vec<String>),
}

impl QueryList {
    fn into_vec(self) -> Vec<String> {
        match self {
            QueryList::One(query) => vec![query],
            QueryList::Many(queries) => queries,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorType {
    #[default]
    Text,
    #[serde(alias = "attr")]
    Attribute,
}

fn default_save_format() -> String {
    OutputFormat::default().as_str().to_string()
}

impl SelectorSpec {
    pub fn into_rule(self) -> Result<ColumnRule, AppError> {
        let queries = self.selector.into_vec();
        match self.kind {
            SelectorType::Text => ColumnRule::text(queries),
            SelectorType::Attribute => {
                let name = self.attribute_name.ok_or_else(|| {
                    AppError::InvalidRule("attribute selector needs an attribute_name".into())
                })?;
                ColumnRule::attribute(name, queries)
            }
        }
    }
}

impl JobSpec {
    /// Parse a job description from JSON text.
    pub fn from_json(text: &str) -> Result<Self, AppError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Validate every selector and build a [`Job`].
    pub fn into_job(self) -> Result<Job, AppError> {
        let format: OutputFormat = self.save_format.parse()?;
        let rules = self
            .selectors
            .into_iter()
            .map(SelectorSpec::into_rule)
            .collect::<Result<Vec<_>, _>>()?;
        Job::new(self.url, rules, format)
    }
}
