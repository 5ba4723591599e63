use serde::Serialize;

use crate::error::{AppError, ErrorKind};

/// Raw response of a fetch: body bytes plus the URL the request ended on.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub body: Vec<u8>,
    /// Final URL after redirects; used as the base for relative links.
    pub final_url: String,
}

impl FetchedPage {
    pub fn new(body: impl Into<Vec<u8>>, final_url: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            final_url: final_url.into(),
        }
    }
}

/// One output row: one cell per column rule, `None` where nothing was extracted.
pub type Row = Vec<Option<String>>;

/// Aligned result of a successful job.
///
/// Rows follow the document order of the first rule's matches and every row
/// has exactly one cell per rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RowSet {
    rows: Vec<Row>,
}

impl RowSet {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }
}

impl<'a> IntoIterator for &'a RowSet {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Terminal result of one scrape job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    Success { rows: RowSet },
    Failure { kind: ErrorKind, message: String },
}

impl Outcome {
    pub fn success(rows: RowSet) -> Self {
        Outcome::Success { rows }
    }

    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        Outcome::Failure {
            kind,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    /// Consume the outcome, turning a failure back into an error value.
    pub fn into_result(self) -> Result<RowSet, (ErrorKind, String)> {
        match self {
            Outcome::Success { rows } => Ok(rows),
            Outcome::Failure { kind, message } => Err((kind, message)),
        }
    }
}

impl From<AppError> for Outcome {
    fn from(err: AppError) -> Self {
        Outcome::failure(err.kind(), err.to_string())
    }
}
