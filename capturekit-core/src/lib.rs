//! Core engine for selfie capture with active liveness detection.
//!
//! This crate contains the portable, UI-free pieces of a SmartSelfie™-style
//! capture flow: per-frame face validation, the directional liveness
//! challenge state machine, the capture orchestrator that decides when
//! images are snapshotted, and the asynchronous job-submission pipeline
//! (authenticate → prep-upload → upload → poll job status).
//!
//! Camera acquisition, face detection, persistence and rendering are all
//! modeled as collaborator traits that host applications implement.
#![warn(clippy::all, clippy::pedantic)]

use strum::{Display, EnumString};

/// The partner API environment against which jobs are submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Environment {
    /// Sandbox environment for integration testing. Jobs are not billed.
    Sandbox,
    /// Live production environment.
    Production,
}

impl Environment {
    /// Base URL of the partner REST API for this environment.
    #[must_use]
    pub const fn base_url(&self) -> &'static str {
        match self {
            Self::Sandbox => "https://testapi.usecapturekit.com/v1",
            Self::Production => "https://api.usecapturekit.com/v1",
        }
    }
}

mod error;
pub use error::*;

mod geometry;
pub use geometry::*;

mod validator;
pub use validator::*;

mod liveness;
pub use liveness::*;

mod artifacts;
pub use artifacts::*;

mod config;
pub use config::*;

mod orchestrator;
pub use orchestrator::*;

mod submission;
pub use submission::*;

pub mod requests;

mod client;
pub use client::SmartSelfieClient;

mod throttle;
pub use throttle::FrameThrottle;

// private modules
mod http_request;
