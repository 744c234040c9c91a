use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode, header::RETRY_AFTER};
use tokio::time::sleep;

use crate::types::ApiErrorBody;

const MAX_ATTEMPTS: u32 = 3;
const MAX_RETRY_AFTER: Duration = Duration::from_secs(10);
const BAD_GATEWAY_DELAY: Duration = Duration::from_secs(1);

/// Sends a request, retrying rate limited (429) and bad gateway (502)
/// responses a bounded number of times.
///
/// The last response is returned as-is when attempts run out, so callers
/// always see the provider's status and body.
pub(crate) async fn send(request: RequestBuilder) -> Result<Response, reqwest::Error> {
    let mut attempt = 1;
    loop {
        let Some(this_attempt) = request.try_clone() else {
            return request.send().await;
        };

        let response = this_attempt.send().await?;
        let status = response.status();
        let retryable =
            status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::BAD_GATEWAY;
        if !retryable || attempt >= MAX_ATTEMPTS {
            return Ok(response);
        }

        let delay = retry_delay(&response);
        tracing::warn!(
            status = status.as_u16(),
            attempt,
            delay_ms = delay.as_millis() as u64,
            "retrying Spotify request"
        );
        sleep(delay).await;
        attempt += 1;
    }
}

fn retry_delay(response: &Response) -> Duration {
    if response.status() == StatusCode::BAD_GATEWAY {
        return BAD_GATEWAY_DELAY;
    }

    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(1))
        .min(MAX_RETRY_AFTER)
}

/// Status, message and machine reason of a failed Web API response.
#[derive(Debug, Clone)]
pub(crate) struct ErrorInfo {
    pub status: u16,
    pub message: String,
    pub reason: Option<String>,
}

pub(crate) async fn error_info(response: Response) -> ErrorInfo {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    let fallback = || {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        } else {
            trimmed.to_string()
        }
    };

    match serde_json::from_str::<ApiErrorBody>(&body) {
        Ok(parsed) => ErrorInfo {
            status: status.as_u16(),
            message: parsed.error.message.unwrap_or_else(fallback),
            reason: parsed.error.reason,
        },
        Err(_) => ErrorInfo {
            status: status.as_u16(),
            message: fallback(),
            reason: None,
        },
    }
}
