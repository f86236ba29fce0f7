use crate::error::{Result, SourceError};
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, ClientBuilder, Response};
use std::time::Duration;
use tokio::time::sleep;

/// User agents to rotate through when no override is configured
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

/// Configuration for the HTTP client
#[derive(Clone, Debug)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub max_retries: usize,
    pub initial_retry_delay_ms: u64,
    pub max_retry_delay_ms: u64,
    pub enable_cookies: bool,
    pub enable_gzip: bool,
    /// Fixed user agent; when unset one is picked from `USER_AGENTS` per request
    pub user_agent: Option<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 4,
            initial_retry_delay_ms: 500,
            max_retry_delay_ms: 8000,
            enable_cookies: true,
            enable_gzip: true,
            user_agent: None,
        }
    }
}

/// reqwest client with browser-like headers and retry on transient failures
pub struct EnhancedHttpClient {
    client: Client,
    config: HttpClientConfig,
}

impl EnhancedHttpClient {
    /// Create a new enhanced HTTP client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(HttpClientConfig::default())
    }

    /// Create a new enhanced HTTP client with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "Accept",
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8"),
        );
        headers.insert("Accept-Language", HeaderValue::from_static("tr-TR,tr;q=0.9,en-US;q=0.8,en;q=0.7"));
        headers.insert("DNT", HeaderValue::from_static("1"));
        headers.insert("Upgrade-Insecure-Requests", HeaderValue::from_static("1"));
        headers.insert("Sec-Fetch-Dest", HeaderValue::from_static("document"));
        headers.insert("Sec-Fetch-Mode", HeaderValue::from_static("navigate"));
        headers.insert("Sec-Fetch-Site", HeaderValue::from_static("none"));

        let client = ClientBuilder::new()
            .timeout(config.timeout)
            .cookie_store(config.enable_cookies)
            .gzip(config.enable_gzip)
            .brotli(config.enable_gzip)
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .default_headers(headers)
            .build()?;

        Ok(Self { client, config })
    }

    fn user_agent(&self) -> String {
        match &self.config.user_agent {
            Some(ua) => ua.clone(),
            None => Self::random_user_agent().to_string(),
        }
    }

    fn random_user_agent() -> &'static str {
        let mut rng = rand::thread_rng();
        USER_AGENTS[rng.gen_range(0..USER_AGENTS.len())]
    }

    /// Exponential backoff with ±25% jitter
    fn calculate_retry_delay(&self, attempt: usize) -> Duration {
        let base_delay = self.config.initial_retry_delay_ms;
        let max_delay = self.config.max_retry_delay_ms;
        let delay_ms = base_delay.saturating_mul(2u64.saturating_pow(attempt as u32)).min(max_delay);

        let mut rng = rand::thread_rng();
        let jitter = rng.gen_range(0.75..=1.25);
        Duration::from_millis((delay_ms as f64 * jitter) as u64)
    }

    fn is_retryable_status(status: reqwest::StatusCode) -> bool {
        matches!(
            status.as_u16(),
            // Rate limiting
            429 |
            // Server errors
            500 | 502 | 503 | 504 |
            // Cloudflare errors
            520 | 521 | 522 | 523 | 524 | 525 | 526 | 527
        )
    }

    /// GET with retries; `extra_headers` replace the defaults they overlap with
    pub async fn get_with_retry_and_headers(
        &self,
        url: &str,
        extra_headers: Option<&HeaderMap>,
    ) -> Result<Response> {
        let mut attempt = 0;
        loop {
            let mut request = self.client.get(url);
            match HeaderValue::from_str(&self.user_agent()) {
                Ok(ua) => request = request.header(USER_AGENT, ua),
                Err(_) => log::warn!("Ignoring invalid user agent override"),
            }
            if let Some(headers) = extra_headers {
                request = request.headers(headers.clone());
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if Self::is_retryable_status(status) && attempt < self.config.max_retries {
                        log::warn!(
                            "Received retryable status {} for {}, attempt {}/{}",
                            status,
                            url,
                            attempt + 1,
                            self.config.max_retries + 1
                        );
                        sleep(self.calculate_retry_delay(attempt)).await;
                        attempt += 1;
                        continue;
                    }
                    if !status.is_success() {
                        return Err(SourceError::Status {
                            status: status.as_u16(),
                            url: url.to_string(),
                        });
                    }
                    return Ok(response);
                }
                Err(e) => {
                    let should_retry = e.is_timeout() || e.is_connect() || e.is_request();
                    if should_retry && attempt < self.config.max_retries {
                        log::warn!(
                            "Request failed for {}, attempt {}/{}: {}",
                            url,
                            attempt + 1,
                            self.config.max_retries + 1,
                            e
                        );
                        sleep(self.calculate_retry_delay(attempt)).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }
    }

    /// Fetch a URL and return the response text
    pub async fn get_text(&self, url: &str) -> Result<String> {
        self.get_text_with_headers(url, &HeaderMap::new()).await
    }

    /// Fetch a URL with custom headers and return the response text
    pub async fn get_text_with_headers(&self, url: &str, headers: &HeaderMap) -> Result<String> {
        let response = self.get_with_retry_and_headers(url, Some(headers)).await?;
        Ok(response.text().await?)
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_client_creation() {
        let client = EnhancedHttpClient::new();
        assert!(client.is_ok());
    }

    #[test]
    fn test_user_agent_override() {
        let config = HttpClientConfig {
            user_agent: Some("merlin-test/1.0".to_string()),
            ..Default::default()
        };
        let client = EnhancedHttpClient::with_config(config).unwrap();
        assert_eq!(client.user_agent(), "merlin-test/1.0");
    }

    #[test]
    fn test_random_user_agent() {
        let client = EnhancedHttpClient::new().unwrap();
        assert!(USER_AGENTS.contains(&client.user_agent().as_str()));
    }

    #[test]
    fn test_retry_delay_calculation() {
        let config = HttpClientConfig {
            initial_retry_delay_ms: 100,
            max_retry_delay_ms: 1000,
            ..Default::default()
        };
        let client = EnhancedHttpClient::with_config(config).unwrap();

        let delay0 = client.calculate_retry_delay(0);
        let delay3 = client.calculate_retry_delay(3);
        let delay10 = client.calculate_retry_delay(10);

        assert!(delay0.as_millis() >= 75 && delay0.as_millis() <= 125);
        assert!(delay3.as_millis() >= 600);
        // Capped at max_retry_delay_ms plus jitter
        assert!(delay10.as_millis() <= 1250);
    }

    #[test]
    fn test_retryable_status() {
        assert!(EnhancedHttpClient::is_retryable_status(reqwest::StatusCode::TOO_MANY_REQUESTS));
        assert!(EnhancedHttpClient::is_retryable_status(reqwest::StatusCode::INTERNAL_SERVER_ERROR));
        assert!(EnhancedHttpClient::is_retryable_status(reqwest::StatusCode::BAD_GATEWAY));
        assert!(EnhancedHttpClient::is_retryable_status(reqwest::StatusCode::SERVICE_UNAVAILABLE));
        assert!(!EnhancedHttpClient::is_retryable_status(reqwest::StatusCode::NOT_FOUND));
        assert!(!EnhancedHttpClient::is_retryable_status(reqwest::StatusCode::FORBIDDEN));
    }
}
