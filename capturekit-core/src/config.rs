use std::collections::HashMap;
use std::time::Duration;

use crate::requests::JobType;

/// Static configuration for one selfie capture session.
#[derive(Debug, Clone)]
pub struct SelfieCaptureConfig {
    /// Whether this session enrolls a new user (vs. authenticating one).
    pub is_enroll: bool,
    /// Partner-scoped user identifier.
    pub user_id: String,
    /// Partner-scoped job identifier.
    pub job_id: String,
    /// Whether re-enrollment of an existing user is permitted.
    pub allow_new_enroll: bool,
    /// Skip the network submission entirely and report success after
    /// capture. Used by hosts that submit through their own backend.
    pub skip_api_submission: bool,
    /// Free-form parameters echoed back in job results.
    pub extra_partner_params: HashMap<String, String>,
    /// Number of liveness proof images to capture.
    pub num_liveness_images: usize,
    /// Target pixel height of the encoded selfie image.
    pub selfie_image_height: u32,
    /// Target pixel height of encoded liveness images.
    pub liveness_image_height: u32,
}

impl SelfieCaptureConfig {
    /// Creates a session config with the standard capture parameters.
    #[must_use]
    pub fn new(is_enroll: bool, user_id: impl Into<String>, job_id: impl Into<String>) -> Self {
        Self {
            is_enroll,
            user_id: user_id.into(),
            job_id: job_id.into(),
            allow_new_enroll: false,
            skip_api_submission: false,
            extra_partner_params: HashMap::new(),
            num_liveness_images: 6,
            selfie_image_height: 640,
            liveness_image_height: 320,
        }
    }

    /// The job type implied by this session.
    #[must_use]
    pub const fn job_type(&self) -> JobType {
        if self.is_enroll {
            JobType::SmartSelfieEnrollment
        } else {
            JobType::SmartSelfieAuthentication
        }
    }
}

/// Tuning for the submission pipeline's job status poll loop.
#[derive(Debug, Clone)]
pub struct SubmissionConfig {
    /// Fixed delay between consecutive status requests.
    pub poll_interval: Duration,
    /// Maximum number of status requests before giving up.
    pub num_attempts: usize,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            num_attempts: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_type_follows_enrollment_flag() {
        assert_eq!(
            SelfieCaptureConfig::new(true, "u", "j").job_type(),
            JobType::SmartSelfieEnrollment
        );
        assert_eq!(
            SelfieCaptureConfig::new(false, "u", "j").job_type(),
            JobType::SmartSelfieAuthentication
        );
    }
}
