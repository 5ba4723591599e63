//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use crate::error::AppError;
use crate::models::FetchedPage;
use crate::runner::{JobEvent, JobReporter};
use crate::traits::{Fetcher, HtmlParser, PageIndex, PageNode};

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Mock fetcher that returns configurable responses.
#[derive(Clone)]
pub struct MockFetcher {
    /// Queue of responses. Each call pops the first element.
    /// If empty, returns a default page for the requested URL.
    responses: Arc<Mutex<Vec<Result<FetchedPage, AppError>>>>,
    requested: Arc<Mutex<Vec<String>>>,
    /// When set, every fetch waits for a permit before answering.
    gate: Option<Arc<Notify>>,
}

impl MockFetcher {
    pub fn new(html: &str, final_url: &str) -> Self {
        Self::with_responses(vec![Ok(FetchedPage::new(html, final_url))])
    }

    pub fn with_error(error: AppError) -> Self {
        Self::with_responses(vec![Err(error)])
    }

    pub fn with_responses(responses: Vec<Result<FetchedPage, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            requested: Arc::new(Mutex::new(Vec::new())),
            gate: None,
        }
    }

    /// A fetcher that blocks until the returned [`Notify`] is signalled.
    pub fn gated(html: &str, final_url: &str) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let mut fetcher = Self::new(html, final_url);
        fetcher.gate = Some(Arc::clone(&gate));
        (fetcher, gate)
    }

    /// URLs passed to `fetch`, in call order.
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, AppError> {
        self.requested.lock().unwrap().push(url.to_string());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(FetchedPage::new("<html><body>default</body></html>", url))
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockPage / MockNode
// ---------------------------------------------------------------------------

/// A node with fixed text and attributes.
#[derive(Debug, Clone, Default)]
pub struct MockNode {
    text: String,
    attrs: HashMap<String, String>,
}

impl MockNode {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            attrs: HashMap::new(),
        }
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }
}

impl PageNode for MockNode {
    fn text(&self) -> String {
        self.text.clone()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.attrs.get(name).cloned()
    }
}

/// Page with canned answers per selector string. Records every query.
#[derive(Debug, Clone, Default)]
pub struct MockPage {
    matches: HashMap<String, Vec<MockNode>>,
    invalid: Vec<String>,
    queried: Arc<Mutex<Vec<String>>>,
}

impl MockPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, selector: &str, nodes: Vec<MockNode>) -> Self {
        self.matches.insert(selector.to_string(), nodes);
        self
    }

    /// Make `selector` fail as if it could not be parsed.
    pub fn with_invalid(mut self, selector: &str) -> Self {
        self.invalid.push(selector.to_string());
        self
    }

    /// Selectors queried so far, in call order.
    pub fn queried(&self) -> Vec<String> {
        self.queried.lock().unwrap().clone()
    }
}

impl PageIndex for MockPage {
    type Node<'a>
        = &'a MockNode
    where
        Self: 'a;

    fn query(&self, selector: &str) -> Result<Vec<&MockNode>, AppError> {
        self.queried.lock().unwrap().push(selector.to_string());
        if self.invalid.iter().any(|s| s == selector) {
            return Err(AppError::SelectorError {
                selector: selector.to_string(),
                message: "mock parse failure".into(),
            });
        }
        Ok(self
            .matches
            .get(selector)
            .map(|nodes| nodes.iter().collect())
            .unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// MockParser
// ---------------------------------------------------------------------------

/// Parser that ignores its input and hands out a prepared page.
#[derive(Clone)]
pub struct MockParser {
    page: MockPage,
    panic: bool,
}

impl MockParser {
    pub fn new(page: MockPage) -> Self {
        Self { page, panic: false }
    }

    /// A parser that panics on every call.
    pub fn panicking() -> Self {
        Self {
            page: MockPage::new(),
            panic: true,
        }
    }

    /// The prepared page; clones share its query log.
    pub fn page(&self) -> &MockPage {
        &self.page
    }
}

impl HtmlParser for MockParser {
    type Page = MockPage;

    fn parse(&self, _body: &[u8]) -> MockPage {
        if self.panic {
            panic!("mock parser failure");
        }
        self.page.clone()
    }
}

// ---------------------------------------------------------------------------
// RecordingReporter
// ---------------------------------------------------------------------------

/// Reporter that records event names.
#[derive(Clone, Default)]
pub struct RecordingReporter {
    events: Arc<Mutex<Vec<String>>>,
}

impl RecordingReporter {
    pub fn names(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl JobReporter for RecordingReporter {
    fn report(&self, event: JobEvent<'_>) {
        self.events.lock().unwrap().push(event.name().to_string());
    }
}
