//! HTML page index backed by the `scraper` crate.
//!
//! CSS selector semantics are whatever `scraper` implements. Documents are
//! decoded as UTF-8 (lossy) and parsed with html5ever's error-tolerant
//! parser, so malformed markup never fails.

use scraper::{ElementRef, Html, Selector};
use tabula_core::error::AppError;
use tabula_core::traits::{HtmlParser, PageIndex, PageNode};

/// [`HtmlParser`] producing [`HtmlPage`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScraperParser;

impl HtmlParser for ScraperParser {
    type Page = HtmlPage;

    fn parse(&self, body: &[u8]) -> HtmlPage {
        HtmlPage::parse(&String::from_utf8_lossy(body))
    }
}

/// A parsed HTML document.
pub struct HtmlPage {
    document: Html,
}

impl HtmlPage {
    pub fn parse(html: &str) -> Self {
        Self {
            document: Html::parse_document(html),
        }
    }
}

impl PageIndex for HtmlPage {
    type Node<'a>
        = HtmlNode<'a>
    where
        Self: 'a;

    fn query(&self, selector: &str) -> Result<Vec<HtmlNode<'_>>, AppError> {
        let parsed = Selector::parse(selector).map_err(|e| AppError::SelectorError {
            selector: selector.to_string(),
            message: e.to_string(),
        })?;
        Ok(self.document.select(&parsed).map(HtmlNode).collect())
    }
}

/// An element of an [`HtmlPage`].
#[derive(Debug, Clone, Copy)]
pub struct HtmlNode<'a>(ElementRef<'a>);

impl PageNode for HtmlNode<'_> {
    fn text(&self) -> String {
        self.0.text().collect()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.0.value().attr(name).map(String::from)
    }
}
