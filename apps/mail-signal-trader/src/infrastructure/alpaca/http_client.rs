//! HTTP client wrapper with retry logic.

use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::api_types::AlpacaErrorResponse;
use super::config::{AlpacaConfig, RetryConfig};
use super::error::AlpacaError;

/// HTTP client for Alpaca API with retry logic.
#[derive(Clone)]
pub struct AlpacaHttpClient {
    client: Client,
    api_key: String,
    api_secret: String,
    trading_base_url: String,
    data_base_url: String,
    retry_config: RetryConfig,
}

impl AlpacaHttpClient {
    /// Create a new HTTP client from config.
    pub fn new(config: &AlpacaConfig) -> Result<Self, AlpacaError> {
        if config.api_key.is_empty() || config.api_secret.is_empty() {
            return Err(AlpacaError::AuthenticationFailed);
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AlpacaError::Http(e.to_string()))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            trading_base_url: config.trading_base_url().trim_end_matches('/').to_string(),
            data_base_url: config.data_base_url().trim_end_matches('/').to_string(),
            retry_config: config.retry.clone(),
        })
    }

    /// Make a GET request to the trading API.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, AlpacaError> {
        self.request(Method::GET, &self.trading_base_url, path, None::<&()>)
            .await
    }

    /// Make a POST request to the trading API.
    pub async fn post<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, AlpacaError> {
        self.request(Method::POST, &self.trading_base_url, path, Some(body))
            .await
    }

    /// Make a GET request to the market data API.
    pub async fn data_get<T: DeserializeOwned>(&self, path: &str) -> Result<T, AlpacaError> {
        self.request(Method::GET, &self.data_base_url, path, None::<&()>)
            .await
    }

    async fn request<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        method: Method,
        base_url: &str,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, AlpacaError> {
        let url = format!("{base_url}{path}");
        let mut backoff = ExponentialBackoff::new(&self.retry_config);

        loop {
            let mut request = self
                .client
                .request(method.clone(), &url)
                .header("APCA-API-KEY-ID", &self.api_key)
                .header("APCA-API-SECRET-KEY", &self.api_secret);
            if let Some(b) = body {
                request = request.json(b);
            }

            let response = match request.send().await {
                Ok(resp) => resp,
                Err(e) => {
                    if let Some(delay) = backoff.next_backoff() {
                        tracing::warn!(
                            error = %e,
                            delay_ms = delay.as_millis(),
                            attempt = backoff.attempt,
                            "Network error, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    tracing::error!(error = %e, %url, "Alpaca unreachable");
                    return Err(AlpacaError::MaxRetriesExceeded {
                        attempts: backoff.attempt,
                    });
                }
            };

            let status = response.status();

            if status.is_success() {
                let text = response
                    .text()
                    .await
                    .map_err(|e| AlpacaError::Network(e.to_string()))?;
                return serde_json::from_str(&text)
                    .map_err(|e| AlpacaError::JsonParse(e.to_string()));
            }

            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());

            let error_body = response.text().await.unwrap_or_default();
            let (error_code, error_message) = parse_error_body(status, error_body);

            match categorize_status(status) {
                ErrorCategory::RateLimited => {
                    if let Some(delay) = backoff.next_backoff() {
                        let delay = retry_after.map_or(delay, |secs| {
                            Duration::from_secs(secs).min(self.retry_config.max_backoff)
                        });
                        tracing::warn!(
                            code = %error_code,
                            delay_ms = delay.as_millis(),
                            "Rate limited, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(AlpacaError::RateLimited {
                        retry_after_secs: retry_after.unwrap_or(60),
                    });
                }
                ErrorCategory::Retryable => {
                    if let Some(delay) = backoff.next_backoff() {
                        tracing::warn!(
                            code = %error_code,
                            message = %error_message,
                            delay_ms = delay.as_millis(),
                            "Retryable error, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(AlpacaError::MaxRetriesExceeded {
                        attempts: backoff.attempt,
                    });
                }
                ErrorCategory::NonRetryable => {
                    return Err(classify_failure(status, path, error_code, error_message));
                }
            }
        }
    }
}

/// Extract `(code, message)` from an error body, falling back to the status.
fn parse_error_body(status: StatusCode, body: String) -> (String, String) {
    match serde_json::from_str::<AlpacaErrorResponse>(&body) {
        Ok(err) => (
            err.code
                .map_or_else(|| status.as_u16().to_string(), |c| c.to_string()),
            err.message,
        ),
        Err(_) => (status.as_u16().to_string(), body),
    }
}

/// Map a non-retryable status to an adapter error.
fn classify_failure(status: StatusCode, path: &str, code: String, message: String) -> AlpacaError {
    match status {
        // Alpaca answers 403 both for bad keys and for orders exceeding buying power.
        StatusCode::FORBIDDEN if message.to_lowercase().contains("insufficient") => {
            AlpacaError::InsufficientFunds(message)
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AlpacaError::AuthenticationFailed,
        StatusCode::NOT_FOUND => AlpacaError::NotFound {
            path: path.to_string(),
        },
        StatusCode::UNPROCESSABLE_ENTITY => AlpacaError::OrderRejected(message),
        _ => AlpacaError::Api { code, message },
    }
}

/// Error category for determining retry behavior.
enum ErrorCategory {
    RateLimited,
    Retryable,
    NonRetryable,
}

/// Categorize HTTP status code for retry handling.
const fn categorize_status(status: StatusCode) -> ErrorCategory {
    match status.as_u16() {
        429 => ErrorCategory::RateLimited,
        408 | 500 | 502 | 503 | 504 => ErrorCategory::Retryable,
        _ => ErrorCategory::NonRetryable,
    }
}

/// Exponential backoff calculator.
struct ExponentialBackoff {
    attempt: u32,
    max_attempts: u32,
    current_backoff: Duration,
    max_backoff: Duration,
    multiplier: f64,
}

impl ExponentialBackoff {
    const fn new(config: &RetryConfig) -> Self {
        Self {
            attempt: 0,
            max_attempts: config.max_attempts,
            current_backoff: config.initial_backoff,
            max_backoff: config.max_backoff,
            multiplier: config.multiplier,
        }
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        self.attempt += 1;
        if self.attempt >= self.max_attempts {
            return None;
        }

        let backoff = self.current_backoff;
        self.current_backoff = Duration::from_secs_f64(
            (self.current_backoff.as_secs_f64() * self.multiplier)
                .min(self.max_backoff.as_secs_f64()),
        );

        Some(backoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categorize_statuses() {
        assert!(matches!(
            categorize_status(StatusCode::TOO_MANY_REQUESTS),
            ErrorCategory::RateLimited
        ));
        for status in [
            StatusCode::REQUEST_TIMEOUT,
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::BAD_GATEWAY,
            StatusCode::SERVICE_UNAVAILABLE,
        ] {
            assert!(matches!(categorize_status(status), ErrorCategory::Retryable));
        }
        for status in [
            StatusCode::BAD_REQUEST,
            StatusCode::NOT_FOUND,
            StatusCode::UNAUTHORIZED,
            StatusCode::UNPROCESSABLE_ENTITY,
        ] {
            assert!(matches!(categorize_status(status), ErrorCategory::NonRetryable));
        }
    }

    #[test]
    fn forbidden_with_insufficient_message_is_funds_error() {
        let err = classify_failure(
            StatusCode::FORBIDDEN,
            "/v2/orders",
            "40310000".to_string(),
            "insufficient buying power".to_string(),
        );
        assert!(matches!(err, AlpacaError::InsufficientFunds(_)));

        let err = classify_failure(
            StatusCode::FORBIDDEN,
            "/v2/account",
            "403".to_string(),
            "forbidden".to_string(),
        );
        assert!(matches!(err, AlpacaError::AuthenticationFailed));
    }

    #[test]
    fn error_body_with_numeric_code() {
        let (code, message) = parse_error_body(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"code":40010001,"message":"qty must be > 0"}"#.to_string(),
        );
        assert_eq!(code, "40010001");
        assert_eq!(message, "qty must be > 0");
    }

    #[test]
    fn error_body_that_is_not_json() {
        let (code, message) =
            parse_error_body(StatusCode::BAD_GATEWAY, "upstream down".to_string());
        assert_eq!(code, "502");
        assert_eq!(message, "upstream down");
    }

    #[test]
    fn exponential_backoff_increments() {
        let config = RetryConfig {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            multiplier: 2.0,
        };
        let mut backoff = ExponentialBackoff::new(&config);

        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(100)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(200)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(400)));
        assert_eq!(backoff.next_backoff(), None);
    }

    #[test]
    fn exponential_backoff_respects_max() {
        let config = RetryConfig {
            max_attempts: 10,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(5),
            multiplier: 10.0,
        };
        let mut backoff = ExponentialBackoff::new(&config);

        backoff.next_backoff();
        assert_eq!(backoff.next_backoff(), Some(Duration::from_secs(5)));
    }
}
