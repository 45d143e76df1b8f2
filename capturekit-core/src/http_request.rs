use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use reqwest::{Method, RequestBuilder, Response};

use crate::error::CaptureKitError;

/// A thin wrapper on an HTTP client. Sets sensible defaults such as timeouts
/// and user-agent, and applies retry middleware for transient failures.
pub(crate) struct Request {
    client: reqwest::Client,
    timeout: Duration,
    max_retries: u32,
}

impl Request {
    pub(crate) fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(30),
            max_retries: 3, // total attempts = 4
        }
    }

    /// Creates a request builder with defaults applied.
    fn req(&self, method: Method, url: &str) -> RequestBuilder {
        self.client.request(method, url).timeout(self.timeout).header(
            "User-Agent",
            format!("capturekit-core/{}", env!("CARGO_PKG_VERSION")),
        )
    }

    pub(crate) fn post(&self, url: &str) -> RequestBuilder {
        self.req(Method::POST, url)
    }

    pub(crate) fn put(&self, url: &str) -> RequestBuilder {
        self.req(Method::PUT, url)
    }

    /// Sends a request built by `post`/`put`, retrying transient failures
    /// (429/5xx responses and timeout/connect errors) with exponential
    /// backoff.
    pub(crate) async fn handle(
        &self,
        request_builder: RequestBuilder,
    ) -> Result<Response, CaptureKitError> {
        let Some(template) = request_builder.try_clone() else {
            // Streaming bodies cannot be retried.
            return execute(request_builder).await.map_err(Into::into);
        };

        let backoff = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(200))
            .with_max_delay(Duration::from_secs(2))
            .with_max_times(self.max_retries as usize);

        (|| async {
            let request_builder = template.try_clone().ok_or_else(|| HandleError {
                url: "<unknown>".to_string(),
                status: None,
                error: "request is no longer cloneable".to_string(),
                retryable: false,
            })?;
            execute(request_builder).await
        })
        .retry(backoff)
        .when(|err: &HandleError| err.retryable)
        .await
        .map_err(Into::into)
    }
}

#[derive(Debug)]
struct HandleError {
    url: String,
    status: Option<u16>,
    error: String,
    retryable: bool,
}

impl From<HandleError> for CaptureKitError {
    fn from(value: HandleError) -> Self {
        Self::NetworkError {
            url: value.url,
            status: value.status,
            error: value.error,
        }
    }
}

async fn execute(request_builder: RequestBuilder) -> Result<Response, HandleError> {
    let (client, request) = request_builder.build_split();
    let request = request.map_err(|err| HandleError {
        url: err
            .url()
            .map_or_else(|| "<unknown>".to_string(), ToString::to_string),
        status: None,
        error: format!("request build failed: {err}"),
        retryable: false,
    })?;
    let url = request.url().to_string();

    match client.execute(request).await {
        Ok(resp) => {
            let status = resp.status().as_u16();
            if status == 429 || (500..600).contains(&status) {
                return Err(HandleError {
                    url,
                    status: Some(status),
                    error: format!("request error with bad status code {status}"),
                    retryable: true,
                });
            }
            Ok(resp)
        }
        Err(err) => {
            let retryable = err.is_timeout() || err.is_connect();
            Err(HandleError {
                url,
                status: None,
                error: format!("request failed: {err}"),
                retryable,
            })
        }
    }
}
