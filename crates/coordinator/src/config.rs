use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning knobs for the scheduler, executors, and watchdog.
///
/// The defaults are the constants the fleet was field-tested with. The
/// rendezvous offsets in particular are provisional geometry (the hauler has
/// no follow capability, so it is parked into the excavator's lower quadrant
/// by a fixed shift) and are deliberately configuration rather than derived.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Decision loop cadence in milliseconds.
    pub tick_period_ms: u64,
    /// Excavator rendezvous goal: this many units from the scout, toward the
    /// excavator, so the excavator stops short of the scout.
    pub excavator_standoff: f64,
    /// Hauler rendezvous goal: negative places the goal on the far side of
    /// the reference robot, away from the hauler.
    pub hauler_standoff: f64,
    /// Shift applied to the dig-site pose so the hauler parks beside it.
    pub dig_site_offset_x: f64,
    pub dig_site_offset_y: f64,
    /// Watchdog: movement below this distance counts as stalled.
    pub stall_distance: f64,
    /// Watchdog: how long a robot may stay within `stall_distance` while
    /// busy before it is flagged out of commission.
    pub stall_window_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: 500,
            excavator_standoff: 5.0,
            hauler_standoff: -5.0,
            dig_site_offset_x: 2.0,
            dig_site_offset_y: 7.0,
            stall_distance: 1.0,
            stall_window_secs: 30,
        }
    }
}

impl SchedulerConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }

    pub fn stall_window(&self) -> Duration {
        Duration::from_secs(self.stall_window_secs)
    }

    pub fn with_tick_period(mut self, period: Duration) -> Self {
        self.tick_period_ms = period.as_millis() as u64;
        self
    }

    pub fn with_standoffs(mut self, excavator: f64, hauler: f64) -> Self {
        self.excavator_standoff = excavator;
        self.hauler_standoff = hauler;
        self
    }

    pub fn with_stall_limits(mut self, distance: f64, window: Duration) -> Self {
        self.stall_distance = distance;
        self.stall_window_secs = window.as_secs();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_field_constants() {
        let config = SchedulerConfig::default();
        assert_eq!(config.tick_period(), Duration::from_millis(500));
        assert_eq!(config.excavator_standoff, 5.0);
        assert_eq!(config.hauler_standoff, -5.0);
        assert_eq!(config.stall_distance, 1.0);
        assert_eq!(config.stall_window(), Duration::from_secs(30));
    }

    #[test]
    fn test_builder_overrides() {
        let config = SchedulerConfig::default()
            .with_tick_period(Duration::from_millis(100))
            .with_standoffs(3.0, -3.0);
        assert_eq!(config.tick_period_ms, 100);
        assert_eq!(config.excavator_standoff, 3.0);
        assert_eq!(config.hauler_standoff, -3.0);
    }

    #[test]
    fn test_config_roundtrips_through_toml_shaped_json() {
        let config = SchedulerConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: SchedulerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.tick_period_ms, config.tick_period_ms);
    }
}
