//! Output sinks for finished row sets.
//!
//! Formats are dispatched through a [`SinkRegistry`]: an immutable map from
//! format name to writer function, built once at startup and passed to
//! whoever persists results.

use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;

use crate::error::AppError;
use crate::models::RowSet;

/// Built-in output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
        }
    }

    /// File extension used when no output path is given.
    pub fn extension(&self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            _ => Err(AppError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// Writes a row set to an open stream.
pub type SinkFn = fn(&RowSet, &mut dyn Write) -> Result<(), AppError>;

/// Immutable format-name → writer mapping.
#[derive(Clone)]
pub struct SinkRegistry {
    writers: HashMap<String, SinkFn>,
}

impl SinkRegistry {
    /// A registry with no formats.
    pub fn empty() -> Self {
        Self {
            writers: HashMap::new(),
        }
    }

    /// A registry with the `csv` and `json` writers.
    pub fn builtin() -> Self {
        Self::empty()
            .with(OutputFormat::Csv.as_str(), write_csv)
            .with(OutputFormat::Json.as_str(), write_json)
    }

    /// Register `writer` under `name` (case-insensitive).
    pub fn with(mut self, name: &str, writer: SinkFn) -> Self {
        self.writers.insert(name.to_lowercase(), writer);
        self
    }

    pub fn get(&self, name: &str) -> Option<SinkFn> {
        self.writers.get(&name.to_lowercase()).copied()
    }

    /// Registered format names, sorted.
    pub fn formats(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.writers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Write `rows` to `out` using the writer registered for `format`.
    pub fn write(&self, rows: &RowSet, format: &str, out: &mut dyn Write) -> Result<(), AppError> {
        let writer = self
            .get(format)
            .ok_or_else(|| AppError::UnsupportedFormat(format.to_string()))?;
        writer(rows, out)
    }

    /// Persist `rows` to the file at `destination`, creating parent directories.
    ///
    /// An empty row set is refused with [`AppError::NoData`].
    pub fn save(&self, rows: &RowSet, format: &str, destination: &Path) -> Result<(), AppError> {
        if rows.is_empty() {
            return Err(AppError::NoData);
        }
        let writer = self
            .get(format)
            .ok_or_else(|| AppError::UnsupportedFormat(format.to_string()))?;

        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut out = BufWriter::new(File::create(destination)?);
        writer(rows, &mut out)?;
        out.flush()?;

        tracing::info!(
            path = %destination.display(),
            %format,
            rows = rows.len(),
            "Saved results"
        );
        Ok(())
    }
}

impl Default for SinkRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Debug for SinkRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkRegistry")
            .field("formats", &self.formats())
            .finish()
    }
}

/// One record per row, no header; missing cells become empty fields.
pub fn write_csv(rows: &RowSet, out: &mut dyn Write) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_writer(out);
    for row in rows {
        writer.write_record(row.iter().map(|cell| cell.as_deref().unwrap_or("")))?;
    }
    writer.flush()?;
    Ok(())
}

/// Array of arrays with 4-space indentation; missing cells become `null`.
pub fn write_json(rows: &RowSet, out: &mut dyn Write) -> Result<(), AppError> {
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut *out, PrettyFormatter::with_indent(b"    "));
    rows.serialize(&mut serializer)?;
    writeln!(out)?;
    Ok(())
}
