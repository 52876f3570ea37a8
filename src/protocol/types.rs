//! Vision and sensor data model: coordinates, detections, obstacle readings.
//!
//! These types cross the boundary from the (out-of-scope) vision producer
//! into the bus; nothing here touches the wire format.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A target point in image space, clamped to the `u16` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Coordinate {
    pub x: u16,
    pub y: u16,
}

impl Coordinate {
    pub fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }

    /// Round-then-clamp conversion from float image-space centers (spec §3).
    ///
    /// Rounds to the nearest integer, then clamps into `[0, 65535]` before
    /// the final cast, so an out-of-range float never wraps.
    pub fn from_f64(x: f64, y: f64) -> Self {
        Self {
            x: clamp_round(x),
            y: clamp_round(y),
        }
    }
}

fn clamp_round(v: f64) -> u16 {
    v.round().clamp(0.0, u16::MAX as f64) as u16
}

/// A single detected object in one vision frame.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Detection {
    pub center: Coordinate,
    pub confidence: f32,
    pub class_id: u32,
}

/// One vision frame's worth of detections, as pushed onto the bus.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DetectionEvent {
    /// Scheduler-clock milliseconds, not wall-clock (spec.md §5).
    pub timestamp: u64,
    pub detections: Vec<Detection>,
    pub frame_height: u32,
    pub frame_width: u32,
}

impl DetectionEvent {
    /// True if any detection's center falls in the configured center band.
    ///
    /// `low`/`high` are fractions of `frame_height` (default 0.25..0.75).
    pub fn has_center_egg(&self, low: f32, high: f32) -> bool {
        if self.frame_height == 0 {
            return false;
        }
        let h = self.frame_height as f32;
        self.detections.iter().any(|d| {
            let frac = d.center.y as f32 / h;
            frac >= low && frac <= high
        })
    }

    /// The detection to pick next: largest `y` (closest to the robot),
    /// ties broken by largest `confidence` (spec.md §4.5).
    pub fn best_pick(&self) -> Option<&Detection> {
        self.detections.iter().max_by(|a, b| {
            a.center
                .y
                .cmp(&b.center.y)
                .then(a.confidence.total_cmp(&b.confidence))
        })
    }

    /// All detections as a pick queue, ordered by `best_pick` priority
    /// (largest `y` first, ties by largest `confidence`).
    pub fn pick_queue(&self) -> Vec<Coordinate> {
        let mut ds: Vec<&Detection> = self.detections.iter().collect();
        ds.sort_by(|a, b| {
            b.center
                .y
                .cmp(&a.center.y)
                .then(b.confidence.total_cmp(&a.confidence))
        });
        ds.into_iter().map(|d| d.center).collect()
    }
}

/// Obstacle-distance reading, from the Actor's ultrasonic/IR sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ObstacleDistance {
    pub cm: u32,
    pub timestamp: u64,
}

impl ObstacleDistance {
    /// True when the reading is close enough to require evasive action.
    pub fn is_near(&self, threshold_cm: u32) -> bool {
        self.cm < threshold_cm
    }
}
