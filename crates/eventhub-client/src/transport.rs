use async_trait::async_trait;
use eventhub_core::config::HttpConfig;
use eventhub_core::error::AppError;
use eventhub_core::source::UpdateMethod;
use reqwest::Client;

/// Network seam used by the cursor and the source client.
///
/// [`HttpTransport`] is the production implementation; tests swap in an
/// in-memory one.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs a GET and returns the response body.
    async fn get(&self, url: &str) -> Result<String, AppError>;

    /// Performs a bodyless call, succeeding on any 2xx status.
    async fn send(&self, method: UpdateMethod, url: &str) -> Result<(), AppError>;
}

/// [`Transport`] backed by a shared `reqwest` client.
///
/// Redirects are followed. There is no retry at this layer: callers decide
/// what a failure means.
///
/// # Examples
///
/// ```no_run
/// use eventhub_client::{HttpTransport, Transport};
/// use eventhub_core::config::HttpConfig;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = HttpTransport::new(&HttpConfig::default())?;
/// let body = transport.get("https://example.com/sample?offset=0&limit=25").await?;
/// println!("{} bytes", body.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    timeout_secs: u64,
}

impl HttpTransport {
    /// Creates a transport from the HTTP configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ClientError` if the HTTP client cannot be built.
    pub fn new(config: &HttpConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::ClientError(e.to_string()))?;

        Ok(Self {
            client,
            timeout_secs: config.timeout.as_secs(),
        })
    }

    fn map_request_error(&self, e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::Timeout(self.timeout_secs)
        } else if e.is_connect() {
            AppError::NetworkError(format!("Connection failed: {}", e))
        } else {
            AppError::NetworkError(e.to_string())
        }
    }

    fn check_status(response: &reqwest::Response, url: &str) -> Result<(), AppError> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(AppError::ClientError(format!(
                "HTTP {} from {}",
                status.as_u16(),
                url
            )))
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<String, AppError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;

        Self::check_status(&response, url)?;

        response
            .text()
            .await
            .map_err(|e| AppError::NetworkError(format!("Failed to read body: {}", e)))
    }

    async fn send(&self, method: UpdateMethod, url: &str) -> Result<(), AppError> {
        let request = match method {
            UpdateMethod::Get => self.client.get(url),
            UpdateMethod::Post => self.client.post(url),
        };

        let response = request
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;

        Self::check_status(&response, url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_new_with_default_config() {
        let transport = HttpTransport::new(&HttpConfig::default()).unwrap();
        assert_eq!(transport.timeout_secs, 10);
    }

    #[test]
    fn test_new_with_custom_timeout() {
        let config = HttpConfig {
            timeout: Duration::from_secs(3),
            ..HttpConfig::default()
        };
        let transport = HttpTransport::new(&config).unwrap();
        assert_eq!(transport.timeout_secs, 3);
    }

    #[tokio::test]
    async fn test_get_invalid_url_is_transport_error() {
        let transport = HttpTransport::new(&HttpConfig::default()).unwrap();
        let result = transport.get("not-a-valid-url").await;
        assert!(matches!(result, Err(AppError::NetworkError(_))));
    }
}
