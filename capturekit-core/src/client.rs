use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde::Serialize;

use crate::error::CaptureKitError;
use crate::http_request::Request;
use crate::requests::{
    AuthenticationRequest, AuthenticationResponse, JobStatusRequest, JobStatusResponse,
    PrepUploadRequest, PrepUploadResponse,
};
use crate::submission::SmartSelfieApi;
use crate::Environment;

/// Production [`SmartSelfieApi`] implementation over the partner REST API.
pub struct SmartSelfieClient {
    request: Request,
    base_url: String,
}

/// Error body returned by the partner API on rejected requests.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: String,
    error: String,
}

impl SmartSelfieClient {
    /// Creates a client for the given environment.
    #[must_use]
    pub fn new(environment: Environment) -> Self {
        Self::with_base_url(environment.base_url())
    }

    /// Creates a client against an explicit base URL. Useful for proxies and
    /// tests.
    #[must_use]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            request: Request::new(),
            base_url: base_url.into(),
        }
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, CaptureKitError> {
        let url = format!("{}/{path}", self.base_url);
        let response = self
            .request
            .handle(self.request.post(&url).json(body))
            .await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, CaptureKitError> {
        let status = response.status();
        if !status.is_success() {
            let url = response.url().to_string();
            // Prefer the partner's structured error when one is present.
            return match response.json::<ApiErrorBody>().await {
                Ok(body) => Err(CaptureKitError::Api {
                    code: body.code,
                    message: body.error,
                }),
                Err(_) => Err(CaptureKitError::NetworkError {
                    url,
                    status: Some(status.as_u16()),
                    error: "request rejected without a decodable error body".to_string(),
                }),
            };
        }
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl SmartSelfieApi for SmartSelfieClient {
    async fn authenticate(
        &self,
        request: AuthenticationRequest,
    ) -> Result<AuthenticationResponse, CaptureKitError> {
        self.post("auth_smile", &request).await
    }

    async fn prep_upload(
        &self,
        request: PrepUploadRequest,
    ) -> Result<PrepUploadResponse, CaptureKitError> {
        self.post("upload", &request).await
    }

    async fn upload(&self, package: Vec<u8>, url: &str) -> Result<(), CaptureKitError> {
        let response = self
            .request
            .handle(
                self.request
                    .put(url)
                    .header("Content-Type", "application/zip")
                    .body(package),
            )
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CaptureKitError::NetworkError {
                url: url.to_string(),
                status: Some(status.as_u16()),
                error: "artifact upload rejected".to_string(),
            });
        }
        Ok(())
    }

    async fn job_status(
        &self,
        request: JobStatusRequest,
    ) -> Result<JobStatusResponse, CaptureKitError> {
        self.post("job_status", &request).await
    }
}
