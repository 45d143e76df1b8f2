use thiserror::Error;

/// The stage of the submission pipeline at which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum SubmissionStage {
    /// Partner authentication (`auth_smile`).
    Authentication,
    /// Obtaining the signed upload destination (`upload`).
    PrepUpload,
    /// Transferring the packaged artifacts to the signed URL.
    Upload,
    /// Polling the job status endpoint.
    JobStatus,
}

/// Error outputs from `CaptureKit`.
#[derive(Debug, Error)]
pub enum CaptureKitError {
    /// A frame could not be resized or encoded for capture.
    #[error("invalid_image: {0}")]
    InvalidImage(String),
    /// Persisting or packaging capture artifacts failed.
    #[error("storage_error: {0}")]
    Storage(#[from] std::io::Error),
    /// Unexpected error serializing information.
    #[error("serialization_error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Network connection error with details.
    #[error("network_error [{url}] (status: {status:?}): {error}")]
    NetworkError {
        /// The URL of the failed request.
        url: String,
        /// HTTP status code, when a response was received.
        status: Option<u16>,
        /// Underlying error description.
        error: String,
    },
    /// HTTP request failure.
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    /// The partner API rejected a request.
    #[error("api_error [{code}]: {message}")]
    Api {
        /// Partner error code.
        code: String,
        /// Human-readable message returned by the API.
        message: String,
    },
    /// A submission pipeline stage failed. The whole pipeline short-circuits;
    /// a retry re-runs it from authentication.
    #[error("submission failed at {stage}: {source}")]
    Submission {
        /// The stage that failed.
        stage: SubmissionStage,
        /// The underlying failure.
        #[source]
        source: Box<CaptureKitError>,
    },
    /// The job status poll budget was exhausted before the job completed.
    ///
    /// Distinct from a hard API error: the outcome is *unknown*, not failed.
    /// Callers should offer "check back later" rather than "retry now".
    #[error("job_status_timeout")]
    JobStatusTimeout,
    /// An operation was requested in a state that does not permit it.
    #[error("invalid_state_transition: {operation} is not valid while {state}")]
    InvalidStateTransition {
        /// The requested operation.
        operation: &'static str,
        /// A description of the current state.
        state: String,
    },
}

impl CaptureKitError {
    /// Tags this error with the submission stage it occurred in.
    #[must_use]
    pub fn at_stage(self, stage: SubmissionStage) -> Self {
        // Timeouts keep their identity so callers can distinguish
        // "status unknown" from a hard stage failure.
        if matches!(self, Self::JobStatusTimeout) {
            return self;
        }
        Self::Submission {
            stage,
            source: Box::new(self),
        }
    }

    /// Whether this error represents an unknown job outcome rather than a
    /// definitive failure.
    #[must_use]
    pub const fn is_status_unknown(&self) -> bool {
        matches!(self, Self::JobStatusTimeout)
    }
}
