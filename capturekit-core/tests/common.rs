//! Common test utilities shared across integration tests.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use capturekit_core::requests::JobStatusResponse;
use capturekit_core::{
    CaptureKitError, FaceGeometry, FeedbackSignal, FeedbackSink, FrameMeasurement,
    FrameSnapshotter, Rect, SelfieCaptureCallback, SelfieQuality,
};

/// The on-screen capture region used by every flow test.
pub const TARGET_FRAME: Rect = Rect::new(30.0, 100.0, 250.0, 350.0);

/// A measurement of a well-lit, well-positioned face at the given head pose.
pub fn valid_measurement(yaw: f64, pitch: f64) -> FrameMeasurement {
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
        brightness: 120,
    }
}

/// Snapshotter that always has a frame buffer; the returned bytes encode the
/// requested height so tests can tell selfie and liveness snapshots apart.
pub struct TestSnapshotter;

impl FrameSnapshotter for TestSnapshotter {
    fn snapshot(&self, height: u32) -> Result<Option<Vec<u8>>, CaptureKitError> {
        Ok(Some(format!("jpeg:{height}").into_bytes()))
    }
}

/// Feedback sink that discards every signal.
pub struct NoopFeedback;

impl FeedbackSink for NoopFeedback {
    fn notify(&self, _signal: FeedbackSignal) {}
}

/// Records which terminal callback fired and with what.
#[derive(Default)]
pub struct RecordingCallback {
    pub successes: Mutex<Vec<(PathBuf, Vec<PathBuf>, Option<JobStatusResponse>)>>,
    pub errors: Mutex<Vec<String>>,
    pub cancels: Mutex<usize>,
}

impl SelfieCaptureCallback for RecordingCallback {
    fn on_success(
        &self,
        selfie_image: &Path,
        liveness_images: &[PathBuf],
        api_response: Option<&JobStatusResponse>,
    ) {
        self.successes.lock().unwrap().push((
            selfie_image.to_path_buf(),
            liveness_images.to_vec(),
            api_response.cloned(),
        ));
    }

    fn on_error(&self, error: &CaptureKitError) {
        self.errors.lock().unwrap().push(error.to_string());
    }

    fn on_cancel(&self) {
        *self.cancels.lock().unwrap() += 1;
    }
}
