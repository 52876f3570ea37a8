//! Runtime configuration and startup validation.

use crate::error::FatalConfigError;

/// Startup configuration for a [`ControlEngine`](crate::engine::ControlEngine).
///
/// No file format is mandated by spec.md; callers construct this directly
/// (e.g. from CLI args or a config file parsed by the surrounding
/// application, which is out of this crate's scope).
#[derive(Debug, Clone)]
pub struct Config {
    /// Device path for the Actor serial link (e.g. `/dev/ttyACM0`).
    pub actor_device: String,
    /// Device path for the Arm serial link (e.g. `/dev/ttyACM1`).
    pub arm_device: String,
    pub baud_rate: u32,
    /// Initial reconnect backoff, doubling up to 10s (spec.md §4.2).
    pub reconnect_delay_ms: u64,
    /// Hard timeout before a pending command surfaces `CommandTimeout`.
    pub command_timeout_ms: u64,
    pub actor_status_period_ms: u64,
    pub arm_status_period_ms: u64,
    pub scan_only_timeout_ms: u64,
    pub move_only_countdown_ms: u64,
    /// Lower bound of the center band, as a fraction of frame height.
    pub center_band_low: f32,
    /// Upper bound of the center band, as a fraction of frame height.
    pub center_band_high: f32,
    /// Distance threshold (cm) below which an obstacle is "near".
    pub obstacle_threshold_cm: u32,
    pub bus_capacity: usize,
    pub bus_backpressure_ms: u64,
    /// Max retries for an ACK-timed-out command before entering the
    /// idle-resend loop (spec.md §4.5).
    pub max_command_retries: u8,
    /// Idle-resend loop period once retries are exhausted.
    pub idle_resend_period_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            actor_device: "/dev/ttyACM0".to_string(),
            arm_device: "/dev/ttyACM1".to_string(),
            baud_rate: 115_200,
            reconnect_delay_ms: 500,
            command_timeout_ms: 5_000,
            actor_status_period_ms: 1_000,
            arm_status_period_ms: 1_000,
            scan_only_timeout_ms: 5_000,
            move_only_countdown_ms: 5_000,
            center_band_low: 0.25,
            center_band_high: 0.75,
            obstacle_threshold_cm: 30,
            bus_capacity: 256,
            bus_backpressure_ms: 250,
            max_command_retries: 3,
            idle_resend_period_ms: 1_000,
        }
    }
}

impl Config {
    /// Validate the configuration, refusing to start on any out-of-range
    /// value (spec.md §7, `FatalConfigError`).
    pub fn validate(&self) -> Result<(), FatalConfigError> {
        if self.center_band_low >= self.center_band_high {
            return Err(FatalConfigError::InvalidCenterBand {
                low: self.center_band_low,
                high: self.center_band_high,
            });
        }
        if self.bus_capacity == 0 {
            return Err(FatalConfigError::ZeroBusCapacity);
        }
        if self.obstacle_threshold_cm == 0 {
            return Err(FatalConfigError::ZeroObstacleThreshold);
        }
        for (name, period) in [
            ("actor_status", self.actor_status_period_ms),
            ("arm_status", self.arm_status_period_ms),
            ("scan_only_timeout", self.scan_only_timeout_ms),
            ("move_only_countdown", self.move_only_countdown_ms),
            ("idle_resend", self.idle_resend_period_ms),
        ] {
            if period == 0 {
                return Err(FatalConfigError::ZeroTimerPeriod { name });
            }
        }
        Ok(())
    }
}
