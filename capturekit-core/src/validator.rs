use std::ops::RangeInclusive;

use strum::Display;

use crate::{FrameMeasurement, LivenessTask, Rect, SelfieQuality};

/// Classification of a detected face's size and position relative to the
/// target capture region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceBoundsState {
    /// The face fills too much of the target region.
    TooLarge,
    /// The face fills too little of the target region.
    TooSmall,
    /// The face is acceptably sized but its center is off the target center.
    OffCenter,
    /// The face is well sized and positioned for capture.
    Appropriate,
}

/// Guidance to surface to the user for the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Instruction {
    /// Position the head inside the capture region.
    HeadInFrame,
    /// Move the device closer to the face.
    MoveCloser,
    /// Move the device away from the face.
    MoveBack,
    /// Find better lighting or steady the camera.
    GoodLight,
    /// Turn the head to the left.
    LookLeft,
    /// Turn the head to the right.
    LookRight,
    /// Tilt the head upward.
    LookUp,
}

/// Per-frame validation verdict. Recomputed on every frame; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceValidationResult {
    /// What to tell the user, if anything.
    pub user_instruction: Option<Instruction>,
    /// Whether the face passes every gate and is ready for capture.
    pub has_valid_face: bool,
    /// Whether the face is acceptably sized and positioned.
    pub face_in_bounds: bool,
}

/// Tunable thresholds for face validation.
///
/// These are product-tuned values; the defaults match the shipped capture
/// experience and the acceptance tests.
#[derive(Debug, Clone)]
pub struct FaceValidatorConfig {
    /// Minimum acceptable `SelfieQuality::passed` score.
    pub quality_threshold: f32,
    /// Acceptable mean luminance range.
    pub luminance_range: RangeInclusive<i32>,
    /// Size ratio separating too-large / too-small faces from acceptable ones.
    pub bounds_multiplier: f64,
    /// Maximum center offset, in points, on either axis.
    pub center_offset_threshold: f64,
}

impl Default for FaceValidatorConfig {
    fn default() -> Self {
        Self {
            quality_threshold: 0.5,
            luminance_range: 80..=200,
            bounds_multiplier: 1.5,
            center_offset_threshold: 50.0,
        }
    }
}

/// Stateless per-frame face validator.
///
/// Compares the latest [`FrameMeasurement`] against a target capture
/// rectangle and produces a [`FaceValidationResult`]. The caller owns all
/// state and re-invokes [`FaceValidator::validate`] on every frame.
#[derive(Debug, Clone)]
pub struct FaceValidator {
    target_frame: Rect,
    config: FaceValidatorConfig,
}

impl FaceValidator {
    /// Creates a validator for the given target capture rectangle.
    #[must_use]
    pub fn new(target_frame: Rect) -> Self {
        Self {
            target_frame,
            config: FaceValidatorConfig::default(),
        }
    }

    /// Creates a validator with custom thresholds.
    #[must_use]
    pub const fn with_config(target_frame: Rect, config: FaceValidatorConfig) -> Self {
        Self {
            target_frame,
            config,
        }
    }

    /// Updates the target capture rectangle, e.g. after a window resize.
    pub fn set_target_frame(&mut self, frame: Rect) {
        self.target_frame = frame;
    }

    /// Validates a single frame measurement.
    ///
    /// `current_task` is the active liveness task, if a challenge is in
    /// progress; it only influences the returned instruction.
    #[must_use]
    pub fn validate(
        &self,
        measurement: &FrameMeasurement,
        current_task: Option<LivenessTask>,
    ) -> FaceValidationResult {
        let bounds_state = self.check_acceptable_bounds(&measurement.geometry.bounding_box);
        let acceptable_bounds = bounds_state == FaceBoundsState::Appropriate;

        let acceptable_brightness = self
            .config
            .luminance_range
            .contains(&measurement.brightness);

        let acceptable_quality = self.check_selfie_quality(&measurement.quality);

        let has_valid_face = acceptable_bounds && acceptable_brightness && acceptable_quality;

        let user_instruction = Self::user_instruction(
            bounds_state,
            has_valid_face,
            acceptable_brightness,
            acceptable_quality,
            current_task,
        );

        FaceValidationResult {
            user_instruction,
            has_valid_face,
            face_in_bounds: acceptable_bounds,
        }
    }

    fn user_instruction(
        bounds_state: FaceBoundsState,
        has_valid_face: bool,
        acceptable_brightness: bool,
        acceptable_quality: bool,
        current_task: Option<LivenessTask>,
    ) -> Option<Instruction> {
        if has_valid_face {
            return current_task.map(|task| match task {
                LivenessTask::LookLeft => Instruction::LookLeft,
                LivenessTask::LookRight => Instruction::LookRight,
                LivenessTask::LookUp => Instruction::LookUp,
            });
        }
        match bounds_state {
            FaceBoundsState::OffCenter => Some(Instruction::HeadInFrame),
            FaceBoundsState::TooSmall => Some(Instruction::MoveCloser),
            FaceBoundsState::TooLarge => Some(Instruction::MoveBack),
            FaceBoundsState::Appropriate => {
                if !acceptable_quality || !acceptable_brightness {
                    Some(Instruction::GoodLight)
                } else {
                    None
                }
            }
        }
    }

    fn check_acceptable_bounds(&self, bounding_box: &Rect) -> FaceBoundsState {
        if bounding_box.width > self.config.bounds_multiplier * self.target_frame.width {
            FaceBoundsState::TooLarge
        } else if bounding_box.width * self.config.bounds_multiplier < self.target_frame.width {
            FaceBoundsState::TooSmall
        } else if (bounding_box.mid_x() - self.target_frame.mid_x()).abs()
            > self.config.center_offset_threshold
            || (bounding_box.mid_y() - self.target_frame.mid_y()).abs()
                > self.config.center_offset_threshold
        {
            FaceBoundsState::OffCenter
        } else {
            FaceBoundsState::Appropriate
        }
    }

    fn check_selfie_quality(&self, quality: &SelfieQuality) -> bool {
        quality.passed >= self.config.quality_threshold
    }
}
