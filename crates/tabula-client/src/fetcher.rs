use std::time::Duration;

use reqwest::Client;
use tabula_core::config::ScrapeConfig;
use tabula_core::error::AppError;
use tabula_core::models::FetchedPage;
use tabula_core::traits::Fetcher;

/// HTTP fetcher using reqwest.
///
/// Downloads raw page bytes with a configurable User-Agent and timeout,
/// following redirects. The URL the request ends on is returned alongside
/// the body so relative links resolve against the page actually served.
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: Client,
    timeout_secs: u64,
}

impl ReqwestFetcher {
    pub fn new() -> Result<Self, AppError> {
        Self::from_config(&ScrapeConfig::default())
    }

    pub fn from_config(config: &ScrapeConfig) -> Result<Self, AppError> {
        Self::build(config.fetch_timeout, &config.user_agent)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, AppError> {
        Self::build(timeout, &ScrapeConfig::default().user_agent)
    }

    fn build(timeout: Duration, user_agent: &str) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            timeout_secs: timeout.as_secs(),
        })
    }

    fn map_send_error(&self, e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::Timeout(self.timeout_secs)
        } else if e.is_connect() {
            AppError::NetworkError(format!("Connection failed: {e}"))
        } else {
            AppError::HttpError(e.to_string())
        }
    }
}

impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, AppError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::HttpError(format!(
                "HTTP {} for {}",
                status.as_u16(),
                url
            )));
        }

        let final_url = response.url().to_string();
        if final_url != url {
            tracing::debug!(%url, %final_url, "Request was redirected");
        }

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(self.timeout_secs)
            } else {
                AppError::HttpError(format!("Failed to read response body: {e}"))
            }
        })?;

        Ok(FetchedPage::new(body.to_vec(), final_url))
    }
}
