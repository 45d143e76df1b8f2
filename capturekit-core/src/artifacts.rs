use std::fs;
use std::path::{Path, PathBuf};

use base64::prelude::{Engine as _, BASE64_STANDARD};
use serde::Serialize;
use uuid::Uuid;

use crate::error::CaptureKitError;
use crate::requests::UploadRequest;

/// Paths of the images captured during one selfie session.
///
/// Built incrementally while capturing; immutable once the session reaches a
/// terminal state and the artifacts are handed to the submission pipeline.
#[derive(Debug, Clone, Default)]
pub struct CapturedArtifacts {
    /// Path of the full-size selfie image, captured at most once.
    pub selfie_image: Option<PathBuf>,
    /// Ordered liveness proof images, at most the configured target count.
    pub liveness_images: Vec<PathBuf>,
}

impl CapturedArtifacts {
    /// Whether a selfie and exactly `target_liveness_count` liveness images
    /// have been captured.
    #[must_use]
    pub fn is_complete(&self, target_liveness_count: usize) -> bool {
        self.selfie_image.is_some() && self.liveness_images.len() == target_liveness_count
    }

    /// Drops all captured paths.
    pub fn clear(&mut self) {
        self.selfie_image = None;
        self.liveness_images.clear();
    }
}

/// Persistence boundary for capture artifacts.
///
/// Implementations own file layout and the upload package format; the
/// orchestrator only tracks the returned paths.
pub trait ArtifactStore: Send + Sync {
    /// Persists the encoded selfie image for a job, returning its path.
    ///
    /// # Errors
    /// Returns an error if the image cannot be written.
    fn create_selfie_file(&self, job_id: &str, image: &[u8]) -> Result<PathBuf, CaptureKitError>;

    /// Persists one encoded liveness image for a job, returning its path.
    ///
    /// # Errors
    /// Returns an error if the image cannot be written.
    fn create_liveness_file(&self, job_id: &str, image: &[u8])
        -> Result<PathBuf, CaptureKitError>;

    /// Packages a job's persisted images plus the manifest into the payload
    /// that gets `PUT` to the signed upload URL.
    ///
    /// # Errors
    /// Returns an error if any referenced image cannot be read or the
    /// package cannot be serialized.
    fn create_upload_package(
        &self,
        job_id: &str,
        manifest: &UploadRequest,
    ) -> Result<Vec<u8>, CaptureKitError>;

    /// Removes every file persisted for a job. Used on reset and cleanup.
    ///
    /// # Errors
    /// Returns an error if the job directory cannot be removed.
    fn delete_job_files(&self, job_id: &str) -> Result<(), CaptureKitError>;
}

/// [`ArtifactStore`] backed by a directory on the local file system.
///
/// Each job gets its own subdirectory; image files are named with random
/// UUIDs so repeated captures never collide. The upload package is a JSON
/// envelope with base64-encoded images alongside the manifest.
#[derive(Debug, Clone)]
pub struct FileSystemStore {
    root: PathBuf,
}

#[derive(Serialize)]
struct PackagedImage<'a> {
    file_name: &'a str,
    image: String,
}

#[derive(Serialize)]
struct PackageEnvelope<'a> {
    #[serde(flatten)]
    manifest: &'a UploadRequest,
    image_payloads: Vec<PackagedImage<'a>>,
}

impl FileSystemStore {
    /// Creates a store rooted at `root`. The directory is created lazily.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn job_dir(&self, job_id: &str) -> PathBuf {
        self.root.join(job_id)
    }

    fn write_image(
        &self,
        job_id: &str,
        prefix: &str,
        image: &[u8],
    ) -> Result<PathBuf, CaptureKitError> {
        let dir = self.job_dir(job_id);
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{prefix}_{}.jpg", Uuid::new_v4()));
        fs::write(&path, image)?;
        Ok(path)
    }
}

impl ArtifactStore for FileSystemStore {
    fn create_selfie_file(&self, job_id: &str, image: &[u8]) -> Result<PathBuf, CaptureKitError> {
        self.write_image(job_id, "si", image)
    }

    fn create_liveness_file(
        &self,
        job_id: &str,
        image: &[u8],
    ) -> Result<PathBuf, CaptureKitError> {
        self.write_image(job_id, "liv", image)
    }

    fn create_upload_package(
        &self,
        job_id: &str,
        manifest: &UploadRequest,
    ) -> Result<Vec<u8>, CaptureKitError> {
        let dir = self.job_dir(job_id);
        let image_payloads = manifest
            .images
            .iter()
            .map(|info| {
                let bytes = fs::read(dir.join(&info.file_name))?;
                Ok(PackagedImage {
                    file_name: &info.file_name,
                    image: BASE64_STANDARD.encode(bytes),
                })
            })
            .collect::<Result<Vec<_>, CaptureKitError>>()?;

        let envelope = PackageEnvelope {
            manifest,
            image_payloads,
        };
        Ok(serde_json::to_vec(&envelope)?)
    }

    fn delete_job_files(&self, job_id: &str) -> Result<(), CaptureKitError> {
        let dir = self.job_dir(job_id);
        if dir.exists() {
            fs::remove_dir_all(dir)?;
        }
        Ok(())
    }
}
