use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle in view coordinates (points).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    /// Horizontal origin.
    pub x: f64,
    /// Vertical origin.
    pub y: f64,
    /// Width of the rectangle.
    pub width: f64,
    /// Height of the rectangle.
    pub height: f64,
}

impl Rect {
    /// Creates a new rectangle.
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The horizontal center of the rectangle.
    #[must_use]
    pub fn mid_x(&self) -> f64 {
        self.x + self.width / 2.0
    }

    /// The vertical center of the rectangle.
    #[must_use]
    pub fn mid_y(&self) -> f64 {
        self.y + self.height / 2.0
    }
}

/// Head pose and position produced by the face detector for a single frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceGeometry {
    /// Bounding box of the detected face in view coordinates.
    pub bounding_box: Rect,
    /// Head roll angle in radians.
    pub roll: f64,
    /// Head yaw angle in radians. Negative is left, positive is right.
    pub yaw: f64,
    /// Head pitch angle in radians. Negative is up.
    pub pitch: f64,
}

/// Model confidence scores for selfie image quality, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelfieQuality {
    /// Confidence that the frame fails the quality check.
    pub failed: f32,
    /// Confidence that the frame passes the quality check.
    pub passed: f32,
}

/// A single analyzed camera frame as reported by the detection collaborator.
///
/// Produced once per processed frame at the throttled rate; immutable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameMeasurement {
    /// Face geometry for the frame.
    pub geometry: FaceGeometry,
    /// Selfie quality scores for the frame.
    pub quality: SelfieQuality,
    /// Mean luminance of the frame, typically in `0..=255`.
    pub brightness: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_midpoints() {
        let rect = Rect::new(30.0, 100.0, 250.0, 350.0);
        assert!((rect.mid_x() - 155.0).abs() < f64::EPSILON);
        assert!((rect.mid_y() - 275.0).abs() < f64::EPSILON);
    }
}
