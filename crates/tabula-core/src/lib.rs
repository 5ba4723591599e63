pub mod config;
pub mod engine;
pub mod error;
pub mod job;
pub mod models;
pub mod rule;
pub mod runner;
pub mod sink;
pub mod traits;

#[cfg(test)]
mod testutil;

pub use config::ScrapeConfig;
pub use error::{AppError, ErrorKind};
pub use job::{Job, JobSpec, JobState};
pub use models::{FetchedPage, Outcome, Row, RowSet};
pub use rule::{ColumnRule, RuleKind};
pub use runner::{JobEvent, JobHandle, JobReporter, JobRunner, TracingJobReporter};
pub use sink::{OutputFormat, SinkRegistry};
pub use traits::{Fetcher, HtmlParser, PageIndex, PageNode};
