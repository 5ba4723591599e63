use std::future::Future;

use crate::error::AppError;
use crate::models::FetchedPage;

/// Fetches raw page bytes from a URL, following redirects.
pub trait Fetcher: Send + Sync + Clone {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<FetchedPage, AppError>> + Send;
}

/// Turns fetched bytes into a queryable page.
///
/// Parsing is best-effort: malformed markup yields whatever tree the parser
/// can recover, never an error.
pub trait HtmlParser: Send + Sync + Clone {
    type Page: PageIndex;

    fn parse(&self, body: &[u8]) -> Self::Page;
}

/// Query surface over a parsed document.
pub trait PageIndex {
    type Node<'a>: PageNode
    where
        Self: 'a;

    /// Returns every node matching `selector`, in document order.
    fn query(&self, selector: &str) -> Result<Vec<Self::Node<'_>>, AppError>;
}

/// A single element of a parsed page.
pub trait PageNode {
    /// Concatenated text of the node and its descendants, untrimmed.
    fn text(&self) -> String;

    fn attribute(&self, name: &str) -> Option<String>;
}

impl<N: PageNode + ?Sized> PageNode for &N {
    fn text(&self) -> String {
        (**self).text()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        (**self).attribute(name)
    }
}
