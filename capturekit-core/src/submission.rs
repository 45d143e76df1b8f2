use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::artifacts::{ArtifactStore, CapturedArtifacts};
use crate::config::{SelfieCaptureConfig, SubmissionConfig};
use crate::error::{CaptureKitError, SubmissionStage};
use crate::requests::{
    AuthenticationRequest, AuthenticationResponse, FailureReason, ImageType, JobStatusRequest,
    JobStatusResponse, PrepUploadRequest, PrepUploadResponse, UploadImageInfo, UploadRequest,
};

/// The four partner API operations the submission pipeline depends on.
///
/// The production implementation is [`crate::SmartSelfieClient`]; tests and
/// offline hosts supply their own.
#[async_trait]
pub trait SmartSelfieApi: Send + Sync {
    /// Authenticates the partner for a job, yielding a signed session.
    async fn authenticate(
        &self,
        request: AuthenticationRequest,
    ) -> Result<AuthenticationResponse, CaptureKitError>;

    /// Obtains the signed upload destination for a job's artifacts.
    async fn prep_upload(
        &self,
        request: PrepUploadRequest,
    ) -> Result<PrepUploadResponse, CaptureKitError>;

    /// Transfers the packaged artifacts to the signed URL.
    async fn upload(&self, package: Vec<u8>, url: &str) -> Result<(), CaptureKitError>;

    /// Fetches one job status snapshot.
    async fn job_status(
        &self,
        request: JobStatusRequest,
    ) -> Result<JobStatusResponse, CaptureKitError>;
}

/// The terminal value of one submission run.
pub type SubmissionOutcome = Result<JobStatusResponse, CaptureKitError>;

/// One-shot submission of a capture session's artifacts.
///
/// A single forward chain: authenticate → prep-upload → package & upload →
/// poll job status. No stage is retried independently except polling; any
/// stage failure short-circuits the rest and surfaces tagged with its stage.
pub struct SubmissionPipeline {
    api: Arc<dyn SmartSelfieApi>,
    store: Arc<dyn ArtifactStore>,
    config: SubmissionConfig,
}

impl SubmissionPipeline {
    /// Creates a pipeline over the given API and artifact store.
    pub fn new(
        api: Arc<dyn SmartSelfieApi>,
        store: Arc<dyn ArtifactStore>,
        config: SubmissionConfig,
    ) -> Self {
        Self { api, store, config }
    }

    /// Runs the full submission chain for one capture session.
    ///
    /// # Errors
    /// Returns a stage-tagged error if authentication, prep-upload or upload
    /// fail, [`CaptureKitError::JobStatusTimeout`] if the poll budget runs
    /// out without the job completing, or the last poll error if the final
    /// attempt itself failed.
    pub async fn submit(
        &self,
        session: &SelfieCaptureConfig,
        artifacts: &CapturedArtifacts,
        failure_reason: Option<FailureReason>,
    ) -> SubmissionOutcome {
        let auth = self
            .api
            .authenticate(AuthenticationRequest {
                job_type: session.job_type(),
                enrollment: session.is_enroll,
                job_id: session.job_id.clone(),
                user_id: session.user_id.clone(),
            })
            .await
            .map_err(|e| e.at_stage(SubmissionStage::Authentication))?;

        let mut partner_params = auth.partner_params.clone();
        partner_params
            .extras
            .extend(session.extra_partner_params.clone());

        let prep = self
            .api
            .prep_upload(PrepUploadRequest {
                partner_params,
                allow_new_enroll: session.allow_new_enroll,
                signature: auth.signature.clone(),
                timestamp: auth.timestamp.clone(),
            })
            .await
            .map_err(|e| e.at_stage(SubmissionStage::PrepUpload))?;

        self.upload_artifacts(session, artifacts, failure_reason, &prep)
            .await
            .map_err(|e| e.at_stage(SubmissionStage::Upload))?;

        self.poll_job_status(JobStatusRequest {
            user_id: session.user_id.clone(),
            job_id: session.job_id.clone(),
            image_links: false,
            history: false,
            signature: auth.signature,
            timestamp: auth.timestamp,
        })
        .await
    }

    async fn upload_artifacts(
        &self,
        session: &SelfieCaptureConfig,
        artifacts: &CapturedArtifacts,
        failure_reason: Option<FailureReason>,
        prep: &PrepUploadResponse,
    ) -> Result<(), CaptureKitError> {
        let manifest = build_manifest(artifacts, failure_reason);
        let package = self
            .store
            .create_upload_package(&session.job_id, &manifest)?;
        self.api.upload(package, &prep.upload_url).await
    }

    /// Polls the job status endpoint until the job completes or the attempt
    /// budget is exhausted.
    ///
    /// A transient error on a non-final attempt is retried after the same
    /// fixed delay; an error on the final attempt is surfaced instead of the
    /// generic timeout, so callers see the most specific failure available.
    async fn poll_job_status(&self, request: JobStatusRequest) -> SubmissionOutcome {
        debug_assert!(self.config.num_attempts > 0);
        for attempt in 1..=self.config.num_attempts {
            let is_final = attempt == self.config.num_attempts;
            match self.api.job_status(request.clone()).await {
                Ok(response) if response.job_complete => return Ok(response),
                Ok(_) if is_final => return Err(CaptureKitError::JobStatusTimeout),
                Err(error) if is_final => {
                    return Err(error.at_stage(SubmissionStage::JobStatus))
                }
                Ok(_) | Err(_) => {
                    log::debug!(
                        "job {} not complete on attempt {attempt}/{}",
                        request.job_id,
                        self.config.num_attempts
                    );
                }
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
        Err(CaptureKitError::JobStatusTimeout)
    }
}

fn build_manifest(
    artifacts: &CapturedArtifacts,
    failure_reason: Option<FailureReason>,
) -> UploadRequest {
    let mut images = Vec::with_capacity(1 + artifacts.liveness_images.len());
    if let Some(selfie) = &artifacts.selfie_image {
        images.push(UploadImageInfo {
            image_type_id: ImageType::SelfieJpgFile,
            file_name: file_name(selfie),
        });
    }
    images.extend(artifacts.liveness_images.iter().map(|path| UploadImageInfo {
        image_type_id: ImageType::LivenessJpgFile,
        file_name: file_name(path),
    }));
    UploadRequest {
        images,
        failure_reason,
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |name| {
            name.to_string_lossy().into_owned()
        })
}
