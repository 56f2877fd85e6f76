use async_trait::async_trait;
use reqwest::{
    header::{ACCEPT, COOKIE},
    Client,
};
use shared::{domain::SelectOption, error::FetchError, protocol::OptionsResponse};
use url::Url;

/// Source of option lists. The HTTP implementation is the production one;
/// tests substitute in-memory fetchers.
#[async_trait]
pub trait OptionsFetcher: Send + Sync {
    async fn fetch_options(&self, url: &Url) -> Result<Vec<SelectOption>, FetchError>;
}

#[derive(Debug, Clone, Default)]
pub struct HttpOptionsFetcher {
    http: Client,
    session_cookie: Option<String>,
}

impl HttpOptionsFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(http: Client) -> Self {
        Self {
            http,
            session_cookie: None,
        }
    }

    /// Sent as the `Cookie` header so admin endpoints see the same session
    /// as the page.
    pub fn with_session_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.session_cookie = Some(cookie.into());
        self
    }
}

#[async_trait]
impl OptionsFetcher for HttpOptionsFetcher {
    async fn fetch_options(&self, url: &Url) -> Result<Vec<SelectOption>, FetchError> {
        let mut request = self
            .http
            .get(url.clone())
            .header(ACCEPT, "application/json");
        if let Some(cookie) = &self.session_cookie {
            request = request.header(COOKIE, cookie);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::transport(url.as_str(), e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::status(url.as_str(), status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::transport(url.as_str(), e.to_string()))?;
        let parsed: OptionsResponse = serde_json::from_slice(&body)
            .map_err(|e| FetchError::decode(url.as_str(), e.to_string()))?;
        Ok(parsed.into_options())
    }
}
