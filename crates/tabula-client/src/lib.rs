pub mod fetcher;
pub mod page;

pub use fetcher::ReqwestFetcher;
pub use page::{HtmlNode, HtmlPage, ScraperParser};
