use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::artifacts::{ArtifactStore, CapturedArtifacts};
use crate::config::{SelfieCaptureConfig, SubmissionConfig};
use crate::error::CaptureKitError;
use crate::liveness::{LivenessChallenge, LivenessEvent, LivenessTask};
use crate::requests::{FailureReason, JobStatusResponse};
use crate::submission::{SmartSelfieApi, SubmissionOutcome, SubmissionPipeline};
use crate::validator::{FaceValidationResult, FaceValidator, Instruction};
use crate::{FrameMeasurement, Rect};

/// Progress of the submission phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingState {
    /// A submission run is in flight.
    InProgress,
    /// The job was submitted and completed successfully.
    Success,
    /// The submission run failed. `retry` is permitted.
    Error,
}

/// Coarse state of a capture session. Transitions only move forward:
/// `CapturingSelfie → Processing(InProgress) → Processing(Success | Error)`;
/// `retry` re-enters `Processing(InProgress)` and `reset` starts a fresh
/// session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// Waiting for a valid face and driving the liveness challenge.
    CapturingSelfie,
    /// Capture finished; the artifacts are being submitted.
    Processing(ProcessingState),
}

/// Supplies encoded snapshots of the most recent camera frame.
pub trait FrameSnapshotter: Send + Sync {
    /// Returns the current frame resized to `height` pixels and JPEG
    /// encoded, or `Ok(None)` when no frame buffer is available yet.
    ///
    /// # Errors
    /// Returns an error if the frame cannot be resized or encoded.
    fn snapshot(&self, height: u32) -> Result<Option<Vec<u8>>, CaptureKitError>;
}

/// Fire-and-forget user feedback signals (haptics, sounds).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackSignal {
    /// A milestone was reached (face locked, task passed, job succeeded).
    Success,
    /// Something went wrong (submission failed).
    Error,
}

/// Receives [`FeedbackSignal`]s. Implementations must not block.
pub trait FeedbackSink: Send + Sync {
    /// Handles one feedback signal.
    fn notify(&self, signal: FeedbackSignal);
}

/// Terminal result callback for one capture session.
///
/// Exactly one of these methods is invoked per session that reaches
/// termination, via [`CaptureOrchestrator::finish`].
pub trait SelfieCaptureCallback: Send + Sync {
    /// The session succeeded end to end.
    fn on_success(
        &self,
        selfie_image: &Path,
        liveness_images: &[PathBuf],
        api_response: Option<&JobStatusResponse>,
    );
    /// The session terminated with an error.
    fn on_error(&self, error: &CaptureKitError);
    /// The session ended without a usable result.
    fn on_cancel(&self);
}

/// The external collaborators a capture session depends on.
pub struct CaptureCollaborators {
    /// Camera frame snapshot provider.
    pub snapshotter: Arc<dyn FrameSnapshotter>,
    /// Artifact persistence and packaging.
    pub store: Arc<dyn ArtifactStore>,
    /// Partner API used by the submission pipeline.
    pub api: Arc<dyn SmartSelfieApi>,
    /// Haptic/audio feedback sink.
    pub feedback: Arc<dyn FeedbackSink>,
    /// Terminal result callback.
    pub callback: Arc<dyn SelfieCaptureCallback>,
}

/// Drives image acquisition from per-frame face measurements and liveness
/// events, and owns the session state machine.
///
/// All shared mutable state (capture state, artifact paths, challenge
/// progress) is owned here exclusively; hosts must marshal frame
/// measurements, timer ticks and control calls onto a single logical thread.
/// The submission pipeline runs on a spawned Tokio task and reports back
/// through a channel that only this orchestrator drains, so there are never
/// concurrent writers.
///
/// Spawning requires an ambient Tokio runtime: every call that can terminate
/// the challenge ([`CaptureOrchestrator::on_frame`],
/// [`CaptureOrchestrator::on_timer_tick`]) as well as
/// [`CaptureOrchestrator::retry`] must be made from within a runtime
/// context. Hosts driving frames from a plain camera thread should enter a
/// [`tokio::runtime::Handle`] on that thread first.
pub struct CaptureOrchestrator {
    config: SelfieCaptureConfig,
    submission_config: SubmissionConfig,
    validator: FaceValidator,
    challenge: LivenessChallenge,
    collaborators: CaptureCollaborators,

    state: CaptureState,
    artifacts: CapturedArtifacts,
    user_instruction: Option<Instruction>,
    last_validation: Option<FaceValidationResult>,
    failure_reason: Option<FailureReason>,
    api_response: Option<JobStatusResponse>,
    last_error: Option<CaptureKitError>,
    result_delivered: bool,

    submission: Option<JoinHandle<()>>,
    outcome_tx: mpsc::UnboundedSender<SubmissionOutcome>,
    outcome_rx: mpsc::UnboundedReceiver<SubmissionOutcome>,
}

impl CaptureOrchestrator {
    /// Creates an orchestrator for one capture session.
    ///
    /// `target_frame` is the on-screen capture region the face is validated
    /// against.
    #[must_use]
    pub fn new(
        config: SelfieCaptureConfig,
        submission_config: SubmissionConfig,
        target_frame: Rect,
        collaborators: CaptureCollaborators,
    ) -> Self {
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        Self {
            config,
            submission_config,
            validator: FaceValidator::new(target_frame),
            challenge: LivenessChallenge::default(),
            collaborators,
            state: CaptureState::CapturingSelfie,
            artifacts: CapturedArtifacts::default(),
            user_instruction: Some(Instruction::HeadInFrame),
            last_validation: None,
            failure_reason: None,
            api_response: None,
            last_error: None,
            result_delivered: false,
            submission: None,
            outcome_tx,
            outcome_rx,
        }
    }

    /// Current session state.
    #[must_use]
    pub const fn state(&self) -> CaptureState {
        self.state
    }

    /// The guidance currently shown to the user, if any.
    #[must_use]
    pub const fn user_instruction(&self) -> Option<Instruction> {
        self.user_instruction
    }

    /// The most recent per-frame validation verdict.
    #[must_use]
    pub const fn last_validation(&self) -> Option<FaceValidationResult> {
        self.last_validation
    }

    /// The liveness task the user must currently perform, if any.
    #[must_use]
    pub const fn current_task(&self) -> Option<LivenessTask> {
        self.challenge.current_task()
    }

    /// Paths captured so far.
    #[must_use]
    pub const fn artifacts(&self) -> &CapturedArtifacts {
        &self.artifacts
    }

    /// The API response of a successful submission, once available.
    #[must_use]
    pub const fn api_response(&self) -> Option<&JobStatusResponse> {
        self.api_response.as_ref()
    }

    /// The error that moved the session to `Processing(Error)`, if any.
    #[must_use]
    pub const fn last_error(&self) -> Option<&CaptureKitError> {
        self.last_error.as_ref()
    }

    /// Updates the target capture region, e.g. after a window resize.
    pub fn set_target_frame(&mut self, frame: Rect) {
        self.validator.set_target_frame(frame);
    }

    /// Processes one admitted frame measurement.
    ///
    /// Frames arriving after capture has finished are ignored. A frame that
    /// first yields a valid face snapshots the selfie and starts the
    /// liveness challenge; subsequent valid-face frames feed the active
    /// task.
    ///
    /// Must be called from within a Tokio runtime context: a frame that
    /// completes the challenge spawns the submission task.
    pub fn on_frame(&mut self, measurement: &FrameMeasurement) {
        if self.state != CaptureState::CapturingSelfie {
            return;
        }

        let result = self
            .validator
            .validate(measurement, self.challenge.current_task());
        self.last_validation = Some(result);
        if self.user_instruction != result.user_instruction {
            self.user_instruction = result.user_instruction;
        }

        if result.has_valid_face && self.artifacts.selfie_image.is_none() {
            if self.capture_selfie_image() {
                self.collaborators.feedback.notify(FeedbackSignal::Success);
                self.challenge.start();
            }
        } else if result.has_valid_face && self.artifacts.selfie_image.is_some() {
            // Only a currently-valid face may advance the challenge; an
            // out-of-bounds or poor-quality frame reporting a large angle
            // must not complete a task.
            let events = self
                .challenge
                .on_measurement(measurement.geometry.yaw, measurement.geometry.pitch);
            self.handle_liveness_events(&events);
        }
    }

    /// Advances the 1-second liveness task timer.
    ///
    /// Hosts drive this from their own clock; it is independent of frame
    /// arrival. Must be called from within a Tokio runtime context: a tick
    /// that times the challenge out spawns the submission task.
    pub fn on_timer_tick(&mut self) {
        if self.state != CaptureState::CapturingSelfie {
            return;
        }
        if let Some(event) = self.challenge.on_timer_tick() {
            self.handle_liveness_events(&[event]);
        }
    }

    /// Re-runs the submission pipeline with the already-captured artifacts.
    /// Must be called from within a Tokio runtime context.
    ///
    /// # Errors
    /// Returns [`CaptureKitError::InvalidStateTransition`] unless the
    /// session is in `Processing(Error)`.
    pub fn retry(&mut self) -> Result<(), CaptureKitError> {
        if self.state != CaptureState::Processing(ProcessingState::Error) {
            return Err(CaptureKitError::InvalidStateTransition {
                operation: "retry",
                state: format!("{:?}", self.state),
            });
        }
        self.last_error = None;
        self.handle_submission();
        Ok(())
    }

    /// Abandons the session: cancels any in-flight submission (its outcome
    /// is discarded and no callback will fire for it), deletes the job's
    /// persisted files, and returns to `CapturingSelfie` with a fresh
    /// challenge.
    pub fn reset(&mut self) {
        self.cancel_submission();
        if let Err(error) = self
            .collaborators
            .store
            .delete_job_files(&self.config.job_id)
        {
            log::warn!("failed to delete files for job {}: {error}", self.config.job_id);
        }
        self.artifacts.clear();
        self.challenge.reset();
        self.state = CaptureState::CapturingSelfie;
        self.user_instruction = Some(Instruction::HeadInFrame);
        self.last_validation = None;
        self.failure_reason = None;
        self.api_response = None;
        self.last_error = None;
        self.result_delivered = false;
    }

    /// Waits for the in-flight submission run to finish and applies its
    /// outcome to the session state. No-op when nothing is in flight.
    pub async fn await_submission(&mut self) {
        if self.submission.is_none() {
            return;
        }
        if let Some(outcome) = self.outcome_rx.recv().await {
            self.apply_submission_outcome(outcome);
        }
    }

    /// Applies an already-arrived submission outcome without waiting.
    ///
    /// Returns `true` if an outcome was applied.
    pub fn poll_submission(&mut self) -> bool {
        match self.outcome_rx.try_recv() {
            Ok(outcome) => {
                self.apply_submission_outcome(outcome);
                true
            }
            Err(_) => false,
        }
    }

    /// Delivers the terminal result callback for this session.
    ///
    /// Exactly one of `on_success` / `on_error` / `on_cancel` fires, once;
    /// repeated calls are no-ops.
    pub fn finish(&mut self) {
        if self.result_delivered {
            return;
        }
        self.result_delivered = true;

        match (&self.state, &self.artifacts.selfie_image) {
            (CaptureState::Processing(ProcessingState::Success), Some(selfie))
                if self
                    .artifacts
                    .is_complete(self.config.num_liveness_images) =>
            {
                self.collaborators.callback.on_success(
                    selfie,
                    &self.artifacts.liveness_images,
                    self.api_response.as_ref(),
                );
            }
            _ => {
                if let Some(error) = &self.last_error {
                    self.collaborators.callback.on_error(error);
                } else {
                    self.collaborators.callback.on_cancel();
                }
            }
        }
    }

    fn handle_liveness_events(&mut self, events: &[LivenessEvent]) {
        for event in events {
            match event {
                LivenessEvent::CaptureImage => self.capture_liveness_image(),
                LivenessEvent::TaskCompleted(_) => {
                    self.collaborators.feedback.notify(FeedbackSignal::Success);
                }
                LivenessEvent::ChallengeCompleted => self.handle_submission(),
                LivenessEvent::ChallengeTimedOut => self.handle_challenge_timeout(),
            }
        }
    }

    /// Snapshots the selfie image. Returns whether an image was captured.
    fn capture_selfie_image(&mut self) -> bool {
        match self
            .collaborators
            .snapshotter
            .snapshot(self.config.selfie_image_height)
        {
            Ok(Some(image)) => match self
                .collaborators
                .store
                .create_selfie_file(&self.config.job_id, &image)
            {
                Ok(path) => {
                    self.artifacts.selfie_image = Some(path);
                    true
                }
                Err(error) => {
                    log::error!("failed to persist selfie image: {error}");
                    false
                }
            },
            // No frame buffer yet: skip, a later frame will capture.
            Ok(None) => false,
            Err(error) => {
                log::error!("failed to encode selfie image: {error}");
                false
            }
        }
    }

    /// Snapshots one liveness proof image. No-op once the target count is
    /// reached or when no frame buffer is available.
    fn capture_liveness_image(&mut self) {
        if self.artifacts.liveness_images.len() >= self.config.num_liveness_images {
            return;
        }
        match self
            .collaborators
            .snapshotter
            .snapshot(self.config.liveness_image_height)
        {
            Ok(Some(image)) => match self
                .collaborators
                .store
                .create_liveness_file(&self.config.job_id, &image)
            {
                Ok(path) => self.artifacts.liveness_images.push(path),
                Err(error) => log::error!("failed to persist liveness image: {error}"),
            },
            Ok(None) => {}
            Err(error) => log::error!("failed to encode liveness image: {error}"),
        }
    }

    /// A timed-out challenge still submits: pad the liveness set from the
    /// last known frame buffer up to the target count, record the reason,
    /// and hand off to the pipeline.
    fn handle_challenge_timeout(&mut self) {
        self.failure_reason = Some(FailureReason::MobileActiveLivenessTimeout);
        let remaining = self
            .config
            .num_liveness_images
            .saturating_sub(self.artifacts.liveness_images.len());
        for _ in 0..remaining {
            self.capture_liveness_image();
        }
        self.handle_submission();
    }

    /// Starts the submission pipeline at most once per outstanding run.
    fn handle_submission(&mut self) {
        if self.submission.is_some() {
            return;
        }
        self.state = CaptureState::Processing(ProcessingState::InProgress);

        if self.config.skip_api_submission {
            self.state = CaptureState::Processing(ProcessingState::Success);
            self.collaborators.feedback.notify(FeedbackSignal::Success);
            return;
        }

        let pipeline = SubmissionPipeline::new(
            Arc::clone(&self.collaborators.api),
            Arc::clone(&self.collaborators.store),
            self.submission_config.clone(),
        );
        let session = self.config.clone();
        let artifacts = self.artifacts.clone();
        let failure_reason = self.failure_reason;
        let outcome_tx = self.outcome_tx.clone();

        self.submission = Some(tokio::spawn(async move {
            let outcome = pipeline.submit(&session, &artifacts, failure_reason).await;
            // The orchestrator may have been reset; a closed channel is fine.
            let _ = outcome_tx.send(outcome);
        }));
    }

    fn apply_submission_outcome(&mut self, outcome: SubmissionOutcome) {
        self.submission = None;
        match outcome {
            Ok(response) => {
                self.api_response = Some(response);
                self.state = CaptureState::Processing(ProcessingState::Success);
                self.collaborators.feedback.notify(FeedbackSignal::Success);
            }
            Err(error) => {
                log::warn!("submission for job {} failed: {error}", self.config.job_id);
                self.last_error = Some(error);
                self.state = CaptureState::Processing(ProcessingState::Error);
                self.collaborators.feedback.notify(FeedbackSignal::Error);
            }
        }
    }

    fn cancel_submission(&mut self) {
        if let Some(handle) = self.submission.take() {
            handle.abort();
        }
        // Discard any outcome that raced with the cancellation so it cannot
        // leak into a later session.
        while self.outcome_rx.try_recv().is_ok() {}
    }
}

impl Drop for CaptureOrchestrator {
    fn drop(&mut self) {
        if let Some(handle) = self.submission.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::geometry::{FaceGeometry, SelfieQuality};
    use crate::liveness::ChallengeState;

    const TARGET_FRAME: Rect = Rect::new(30.0, 100.0, 250.0, 350.0);

    fn valid_measurement(yaw: f64, pitch: f64) -> FrameMeasurement {
        FrameMeasurement {
            geometry: FaceGeometry {
                bounding_box: Rect::new(65.0, 164.0, 190.0, 190.0),
                roll: 0.0,
                yaw,
                pitch,
            },
            quality: SelfieQuality {
                failed: 0.1,
                passed: 0.9,
            },
            brightness: 100,
        }
    }

    /// A face far too small for the target frame, otherwise well lit.
    fn invalid_measurement(yaw: f64, pitch: f64) -> FrameMeasurement {
        FrameMeasurement {
            geometry: FaceGeometry {
                bounding_box: Rect::new(120.0, 220.0, 40.0, 40.0),
                roll: 0.0,
                yaw,
                pitch,
            },
            quality: SelfieQuality {
                failed: 0.1,
                passed: 0.9,
            },
            brightness: 100,
        }
    }

    #[derive(Debug, Clone, Copy)]
    enum SnapshotBehavior {
        Frame,
        NoBuffer,
        EncodeFailure,
    }

    struct StubSnapshotter {
        behavior: Mutex<SnapshotBehavior>,
        calls: AtomicUsize,
    }

    impl StubSnapshotter {
        fn new(behavior: SnapshotBehavior) -> Self {
            Self {
                behavior: Mutex::new(behavior),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl FrameSnapshotter for StubSnapshotter {
        fn snapshot(&self, height: u32) -> Result<Option<Vec<u8>>, CaptureKitError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match *self.behavior.lock().unwrap() {
                SnapshotBehavior::Frame => Ok(Some(vec![0xFF; height as usize])),
                SnapshotBehavior::NoBuffer => Ok(None),
                SnapshotBehavior::EncodeFailure => Err(CaptureKitError::InvalidImage(
                    "resize failed".to_string(),
                )),
            }
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        files: Mutex<Vec<PathBuf>>,
        deleted_jobs: Mutex<Vec<String>>,
    }

    impl ArtifactStore for MemoryStore {
        fn create_selfie_file(
            &self,
            job_id: &str,
            _image: &[u8],
        ) -> Result<PathBuf, CaptureKitError> {
            let mut files = self.files.lock().unwrap();
            let path = PathBuf::from(format!("/jobs/{job_id}/si_{}.jpg", files.len()));
            files.push(path.clone());
            Ok(path)
        }

        fn create_liveness_file(
            &self,
            job_id: &str,
            _image: &[u8],
        ) -> Result<PathBuf, CaptureKitError> {
            let mut files = self.files.lock().unwrap();
            let path = PathBuf::from(format!("/jobs/{job_id}/liv_{}.jpg", files.len()));
            files.push(path.clone());
            Ok(path)
        }

        fn create_upload_package(
            &self,
            _job_id: &str,
            manifest: &crate::requests::UploadRequest,
        ) -> Result<Vec<u8>, CaptureKitError> {
            Ok(serde_json::to_vec(manifest)?)
        }

        fn delete_job_files(&self, job_id: &str) -> Result<(), CaptureKitError> {
            self.deleted_jobs.lock().unwrap().push(job_id.to_string());
            Ok(())
        }
    }

    /// API stub that never completes a request body check and always
    /// reports a complete, successful job.
    struct HappyApi;

    #[async_trait::async_trait]
    impl SmartSelfieApi for HappyApi {
        async fn authenticate(
            &self,
            request: crate::requests::AuthenticationRequest,
        ) -> Result<crate::requests::AuthenticationResponse, CaptureKitError> {
            Ok(crate::requests::AuthenticationResponse {
                success: true,
                signature: "sig".to_string(),
                timestamp: "ts".to_string(),
                partner_params: crate::requests::PartnerParams {
                    job_id: request.job_id,
                    user_id: request.user_id,
                    job_type: request.job_type,
                    extras: std::collections::HashMap::new(),
                },
            })
        }

        async fn prep_upload(
            &self,
            _request: crate::requests::PrepUploadRequest,
        ) -> Result<crate::requests::PrepUploadResponse, CaptureKitError> {
            Ok(crate::requests::PrepUploadResponse {
                code: "2202".to_string(),
                ref_id: "ref".to_string(),
                upload_url: "https://uploads.example/abc".to_string(),
                smile_job_id: "0000001".to_string(),
            })
        }

        async fn upload(&self, _package: Vec<u8>, _url: &str) -> Result<(), CaptureKitError> {
            Ok(())
        }

        async fn job_status(
            &self,
            _request: crate::requests::JobStatusRequest,
        ) -> Result<crate::requests::JobStatusResponse, CaptureKitError> {
            Ok(crate::requests::JobStatusResponse {
                timestamp: "ts".to_string(),
                job_complete: true,
                job_success: true,
                code: "2302".to_string(),
                result: None,
            })
        }
    }

    #[derive(Default)]
    struct RecordingFeedback {
        signals: Mutex<Vec<FeedbackSignal>>,
    }

    impl FeedbackSink for RecordingFeedback {
        fn notify(&self, signal: FeedbackSignal) {
            self.signals.lock().unwrap().push(signal);
        }
    }

    #[derive(Default)]
    struct RecordingCallback {
        outcomes: Mutex<Vec<String>>,
    }

    impl SelfieCaptureCallback for RecordingCallback {
        fn on_success(
            &self,
            _selfie_image: &Path,
            liveness_images: &[PathBuf],
            _api_response: Option<&JobStatusResponse>,
        ) {
            self.outcomes
                .lock()
                .unwrap()
                .push(format!("success:{}", liveness_images.len()));
        }

        fn on_error(&self, error: &CaptureKitError) {
            self.outcomes.lock().unwrap().push(format!("error:{error}"));
        }

        fn on_cancel(&self) {
            self.outcomes.lock().unwrap().push("cancel".to_string());
        }
    }

    struct Harness {
        orchestrator: CaptureOrchestrator,
        snapshotter: Arc<StubSnapshotter>,
        store: Arc<MemoryStore>,
        feedback: Arc<RecordingFeedback>,
        callback: Arc<RecordingCallback>,
    }

    fn harness(behavior: SnapshotBehavior) -> Harness {
        let snapshotter = Arc::new(StubSnapshotter::new(behavior));
        let store = Arc::new(MemoryStore::default());
        let feedback = Arc::new(RecordingFeedback::default());
        let callback = Arc::new(RecordingCallback::default());
        let orchestrator = CaptureOrchestrator::new(
            SelfieCaptureConfig::new(true, "user-1", "job-1"),
            SubmissionConfig {
                poll_interval: std::time::Duration::from_millis(1),
                num_attempts: 3,
            },
            TARGET_FRAME,
            CaptureCollaborators {
                snapshotter: Arc::clone(&snapshotter) as Arc<dyn FrameSnapshotter>,
                store: Arc::clone(&store) as Arc<dyn ArtifactStore>,
                api: Arc::new(HappyApi),
                feedback: Arc::clone(&feedback) as Arc<dyn FeedbackSink>,
                callback: Arc::clone(&callback) as Arc<dyn SelfieCaptureCallback>,
            },
        );
        Harness {
            orchestrator,
            snapshotter,
            store,
            feedback,
            callback,
        }
    }

    #[tokio::test]
    async fn test_valid_face_captures_selfie_once_and_starts_challenge() {
        let mut h = harness(SnapshotBehavior::Frame);

        h.orchestrator.on_frame(&valid_measurement(0.0, 0.0));
        assert!(h.orchestrator.artifacts().selfie_image.is_some());
        assert!(h.orchestrator.current_task().is_some());
        assert_eq!(
            h.feedback.signals.lock().unwrap().as_slice(),
            &[FeedbackSignal::Success]
        );

        // A second valid frame must not re-capture the selfie.
        h.orchestrator.on_frame(&valid_measurement(0.0, 0.0));
        assert_eq!(h.snapshotter.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_face_frames_do_not_advance_liveness() {
        let mut h = harness(SnapshotBehavior::Frame);
        h.orchestrator.on_frame(&valid_measurement(0.0, 0.0));
        let task_before = h.orchestrator.current_task();
        assert!(task_before.is_some());

        // Frames whose face fails validation (too small) at full task
        // angles: the challenge must neither progress nor complete.
        for _ in 0..20 {
            let (yaw, pitch) = match h.orchestrator.current_task() {
                Some(LivenessTask::LookLeft) => (-0.35, 0.0),
                Some(LivenessTask::LookRight) => (0.35, 0.0),
                Some(LivenessTask::LookUp) => (0.0, -0.35),
                None => break,
            };
            h.orchestrator.on_frame(&invalid_measurement(yaw, pitch));
        }

        assert_eq!(h.orchestrator.state(), CaptureState::CapturingSelfie);
        assert_eq!(h.orchestrator.current_task(), task_before);
        assert!(h.orchestrator.artifacts().liveness_images.is_empty());
        let ChallengeState::TaskActive { progress, .. } = h.orchestrator.challenge.state() else {
            panic!("expected active task");
        };
        assert!(progress.abs() < f64::EPSILON);

        // The same angles on valid-face frames do advance the challenge.
        let (yaw, pitch) = match task_before {
            Some(LivenessTask::LookLeft) => (-0.35, 0.0),
            Some(LivenessTask::LookRight) => (0.35, 0.0),
            Some(LivenessTask::LookUp) | None => (0.0, -0.35),
        };
        h.orchestrator.on_frame(&valid_measurement(yaw, pitch));
        assert_eq!(h.orchestrator.artifacts().liveness_images.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_frame_buffer_is_a_silent_no_op() {
        let mut h = harness(SnapshotBehavior::NoBuffer);

        h.orchestrator.on_frame(&valid_measurement(0.0, 0.0));
        assert!(h.orchestrator.artifacts().selfie_image.is_none());
        assert!(h.orchestrator.current_task().is_none());
        assert_eq!(h.orchestrator.state(), CaptureState::CapturingSelfie);
    }

    #[tokio::test]
    async fn test_encode_failure_does_not_corrupt_state() {
        let mut h = harness(SnapshotBehavior::EncodeFailure);

        h.orchestrator.on_frame(&valid_measurement(0.0, 0.0));
        assert!(h.orchestrator.artifacts().selfie_image.is_none());
        assert_eq!(h.orchestrator.state(), CaptureState::CapturingSelfie);

        // Recovered frames proceed normally.
        *h.snapshotter.behavior.lock().unwrap() = SnapshotBehavior::Frame;
        h.orchestrator.on_frame(&valid_measurement(0.0, 0.0));
        assert!(h.orchestrator.artifacts().selfie_image.is_some());
    }

    #[tokio::test]
    async fn test_liveness_images_are_capped_at_target_count() {
        let mut h = harness(SnapshotBehavior::Frame);
        h.orchestrator.on_frame(&valid_measurement(0.0, 0.0));

        // Far more capture events than the configured budget of 6.
        for _ in 0..20 {
            h.orchestrator.capture_liveness_image();
        }
        assert_eq!(h.orchestrator.artifacts().liveness_images.len(), 6);
    }

    #[tokio::test]
    async fn test_retry_is_rejected_outside_error_state() {
        let mut h = harness(SnapshotBehavior::Frame);
        let error = h.orchestrator.retry().unwrap_err();
        assert!(matches!(
            error,
            CaptureKitError::InvalidStateTransition {
                operation: "retry",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_challenge_timeout_pads_images_and_submits() {
        let mut h = harness(SnapshotBehavior::Frame);
        h.orchestrator.on_frame(&valid_measurement(0.0, 0.0));

        for _ in 0..120 {
            h.orchestrator.on_timer_tick();
        }
        assert_eq!(
            h.orchestrator.state(),
            CaptureState::Processing(ProcessingState::InProgress)
        );
        // Padded to the full target count from the last frame buffer.
        assert_eq!(h.orchestrator.artifacts().liveness_images.len(), 6);
        assert_eq!(
            h.orchestrator.failure_reason,
            Some(FailureReason::MobileActiveLivenessTimeout)
        );

        h.orchestrator.await_submission().await;
        assert_eq!(
            h.orchestrator.state(),
            CaptureState::Processing(ProcessingState::Success)
        );
    }

    #[tokio::test]
    async fn test_skip_api_submission_reports_success_without_network() {
        let snapshotter = Arc::new(StubSnapshotter::new(SnapshotBehavior::Frame));
        let store = Arc::new(MemoryStore::default());
        let mut config = SelfieCaptureConfig::new(true, "user-1", "job-1");
        config.skip_api_submission = true;
        let mut orchestrator = CaptureOrchestrator::new(
            config,
            SubmissionConfig::default(),
            TARGET_FRAME,
            CaptureCollaborators {
                snapshotter,
                store,
                api: Arc::new(HappyApi),
                feedback: Arc::new(RecordingFeedback::default()),
                callback: Arc::new(RecordingCallback::default()),
            },
        );

        orchestrator.on_frame(&valid_measurement(0.0, 0.0));
        for _ in 0..120 {
            orchestrator.on_timer_tick();
        }
        assert_eq!(
            orchestrator.state(),
            CaptureState::Processing(ProcessingState::Success)
        );
        assert!(orchestrator.api_response().is_none());
    }

    #[tokio::test]
    async fn test_reset_clears_session_and_deletes_files() {
        let mut h = harness(SnapshotBehavior::Frame);
        h.orchestrator.on_frame(&valid_measurement(0.0, 0.0));
        assert!(h.orchestrator.artifacts().selfie_image.is_some());

        h.orchestrator.reset();
        assert_eq!(h.orchestrator.state(), CaptureState::CapturingSelfie);
        assert!(h.orchestrator.artifacts().selfie_image.is_none());
        assert!(h.orchestrator.current_task().is_none());
        assert_eq!(
            h.store.deleted_jobs.lock().unwrap().as_slice(),
            &["job-1".to_string()]
        );
    }

    #[tokio::test]
    async fn test_finish_delivers_exactly_one_callback() {
        let mut h = harness(SnapshotBehavior::Frame);
        h.orchestrator.finish();
        h.orchestrator.finish();
        assert_eq!(
            h.callback.outcomes.lock().unwrap().as_slice(),
            &["cancel".to_string()]
        );
    }
}
