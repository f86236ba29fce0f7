use crate::error::Result;
use crate::http_client::EnhancedHttpClient;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, REFERER, USER_AGENT};

/// Transport used by sources. Implementations must fail on non-success statuses.
#[async_trait]
pub trait WebClient: Send + Sync {
    async fn get_text(&self, url: &str, headers: &HeaderMap) -> Result<String>;
}

#[async_trait]
impl WebClient for EnhancedHttpClient {
    async fn get_text(&self, url: &str, headers: &HeaderMap) -> Result<String> {
        self.get_text_with_headers(url, headers).await
    }
}

/// Headers that make a request look like it came from a desktop browser on `referer`
pub fn browser_headers(user_agent: &'static str, referer: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(user_agent));
    match HeaderValue::from_str(referer) {
        Ok(value) => {
            headers.insert(REFERER, value);
        }
        Err(_) => log::warn!("Skipping invalid referer {}", referer),
    }
    headers
}

/// Headers carrying only the user agent override, if one is set
pub fn user_agent_headers(user_agent: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Some(value) = user_agent.and_then(|ua| HeaderValue::from_str(ua).ok()) {
        headers.insert(USER_AGENT, value);
    }
    headers
}
