//! Wire models for the partner REST API.
//!
//! Field sets follow the partner job API: snake_case JSON keys, integer job
//! type codes, and signature/timestamp pairs issued by the authentication
//! endpoint and echoed on subsequent requests.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum::Display;

/// The product a job runs. Serialized as the partner API's integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum JobType {
    /// Authenticate a previously enrolled user against their selfie.
    SmartSelfieAuthentication,
    /// Enroll a new user with a selfie and liveness proof images.
    SmartSelfieEnrollment,
}

impl JobType {
    /// The integer code used on the wire.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::SmartSelfieAuthentication => 2,
            Self::SmartSelfieEnrollment => 4,
        }
    }
}

impl Serialize for JobType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for JobType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match u8::deserialize(deserializer)? {
            2 => Ok(Self::SmartSelfieAuthentication),
            4 => Ok(Self::SmartSelfieEnrollment),
            other => Err(serde::de::Error::custom(format!(
                "unknown job type code: {other}"
            ))),
        }
    }
}

/// Identifiers tying a job to a partner, user and product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerParams {
    /// The partner-scoped job identifier.
    pub job_id: String,
    /// The partner-scoped user identifier.
    pub user_id: String,
    /// The product being run.
    pub job_type: JobType,
    /// Free-form extra parameters echoed back in job results.
    #[serde(flatten)]
    pub extras: HashMap<String, String>,
}

/// Request body for the `auth_smile` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticationRequest {
    /// The product being run.
    pub job_type: JobType,
    /// Whether this job enrolls a new user.
    pub enrollment: bool,
    /// The partner-scoped job identifier.
    pub job_id: String,
    /// The partner-scoped user identifier.
    pub user_id: String,
}

/// Response body from the `auth_smile` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticationResponse {
    /// Whether authentication succeeded.
    pub success: bool,
    /// Signature to echo on subsequent requests for this job.
    pub signature: String,
    /// Timestamp the signature was computed over.
    pub timestamp: String,
    /// Canonical partner params for the job.
    pub partner_params: PartnerParams,
}

/// Request body for the `upload` (prep-upload) endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepUploadRequest {
    /// Canonical partner params from authentication.
    pub partner_params: PartnerParams,
    /// Whether re-enrollment of an existing user is permitted.
    pub allow_new_enroll: bool,
    /// Signature issued by authentication.
    pub signature: String,
    /// Timestamp the signature was computed over.
    pub timestamp: String,
}

/// Response body from the `upload` (prep-upload) endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepUploadResponse {
    /// Partner status code.
    pub code: String,
    /// Server-side reference for this upload.
    pub ref_id: String,
    /// Short-lived signed URL the artifact zip must be `PUT` to.
    pub upload_url: String,
    /// The backend's job identifier.
    pub smile_job_id: String,
}

/// Category of an image inside the upload package manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageType {
    /// The primary selfie, as a JPEG file.
    SelfieJpgFile,
    /// A liveness proof frame, as a JPEG file.
    LivenessJpgFile,
}

impl ImageType {
    /// The integer code used on the wire.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::SelfieJpgFile => 2,
            Self::LivenessJpgFile => 6,
        }
    }
}

impl Serialize for ImageType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for ImageType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match u8::deserialize(deserializer)? {
            2 => Ok(Self::SelfieJpgFile),
            6 => Ok(Self::LivenessJpgFile),
            other => Err(serde::de::Error::custom(format!(
                "unknown image type code: {other}"
            ))),
        }
    }
}

/// One image entry in the upload package manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadImageInfo {
    /// The category of the image.
    pub image_type_id: ImageType,
    /// File name of the image inside the package.
    pub file_name: String,
}

/// Reason a capture session ended without a fully passed challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The active liveness challenge timed out on device.
    MobileActiveLivenessTimeout,
}

/// Manifest describing the packaged artifacts (`info.json` inside the zip).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadRequest {
    /// Images included in the package, selfie first.
    pub images: Vec<UploadImageInfo>,
    /// Why the capture ended early, when it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<FailureReason>,
}

/// Request body for the `job_status` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusRequest {
    /// The partner-scoped user identifier.
    pub user_id: String,
    /// The partner-scoped job identifier.
    pub job_id: String,
    /// Whether to include signed image links in the response.
    pub image_links: bool,
    /// Whether to include the job's status history in the response.
    pub history: bool,
    /// Signature issued by authentication.
    pub signature: String,
    /// Timestamp the signature was computed over.
    pub timestamp: String,
}

/// Response body from the `job_status` endpoint.
///
/// The shape of `result` varies by product and partner configuration, so it
/// is kept as raw JSON for callers to interpret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusResponse {
    /// Server timestamp of this status snapshot.
    pub timestamp: String,
    /// Whether the backend finished processing the job.
    pub job_complete: bool,
    /// Whether the job passed, once complete.
    pub job_success: bool,
    /// Partner status code.
    pub code: String,
    /// Product-specific result payload, present once available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}
