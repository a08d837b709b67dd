//! Scheduler configuration
//!
//! Settings can be created programmatically, loaded from a JSON file, or
//! overridden through environment variables.

use crate::bitmap::Color;
use crate::frame_budget::{FrameBudget, EVENT_PROCESSING_RESERVE, FRAME_BUDGET_60FPS};
use image::Rgba;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Where jobs render their pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetPolicy {
    /// One bitmap per page, sized to the page
    #[default]
    PerPage,
    /// All pages draw into one viewport-sized canvas at their own offset
    SharedCanvas,
}

impl FromStr for TargetPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per_page" | "per-page" => Ok(Self::PerPage),
            "shared_canvas" | "shared-canvas" | "shared" => Ok(Self::SharedCanvas),
            _ => Err(ConfigError::InvalidValue(format!("render policy `{s}`"))),
        }
    }
}

/// Configuration for [`ProgressiveScheduler`](crate::ProgressiveScheduler).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Render target allocation policy
    pub target_policy: TargetPolicy,
    /// Starting pacing budget per job, in milliseconds
    pub initial_wait_ms: u64,
    /// Pacing budget increment per granted pause, in milliseconds
    pub wait_step_ms: u64,
    /// Time slice handed to the engine per call, in microseconds
    pub slice_budget_us: u64,
    /// Part of the slice reserved for event processing, in microseconds
    pub slice_reserve_us: u64,
    /// Inset of the white area inside the error placeholder, in pixels
    pub error_margin: u32,
    /// Border color of the error placeholder (RGBA)
    pub error_color: [u8; 4],
    /// Color a fresh target is filled with before the engine draws (RGBA)
    pub page_back_color: [u8; 4],
    /// Draw form fields over finished pages
    pub render_forms: bool,
    /// Largest single bitmap the scheduler will allocate, in bytes
    pub max_bitmap_bytes: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            target_policy: TargetPolicy::PerPage,
            initial_wait_ms: 10,
            wait_step_ms: 10,
            slice_budget_us: micros(FRAME_BUDGET_60FPS),
            slice_reserve_us: micros(EVENT_PROCESSING_RESERVE),
            error_margin: 5,
            error_color: [255, 0, 0, 255],
            page_back_color: [255, 255, 255, 255],
            render_forms: true,
            max_bitmap_bytes: 256 * 1024 * 1024, // 256 MB
        }
    }
}

impl SchedulerConfig {
    pub fn with_target_policy(mut self, policy: TargetPolicy) -> Self {
        self.target_policy = policy;
        self
    }

    pub fn with_initial_wait(mut self, wait: Duration) -> Self {
        self.initial_wait_ms = millis_ceil(wait);
        self
    }

    pub fn with_wait_step(mut self, step: Duration) -> Self {
        self.wait_step_ms = millis_ceil(step);
        self
    }

    pub fn with_slice_budget(mut self, budget: Duration, reserve: Duration) -> Self {
        self.slice_budget_us = micros(budget);
        self.slice_reserve_us = micros(reserve);
        self
    }

    pub fn with_render_forms(mut self, render_forms: bool) -> Self {
        self.render_forms = render_forms;
        self
    }

    pub fn with_max_bitmap_bytes(mut self, bytes: usize) -> Self {
        self.max_bitmap_bytes = bytes;
        self
    }

    pub fn with_page_back_color(mut self, color: Color) -> Self {
        self.page_back_color = color.0;
        self
    }

    pub fn initial_wait(&self) -> Duration {
        Duration::from_millis(self.initial_wait_ms)
    }

    pub fn wait_step(&self) -> Duration {
        Duration::from_millis(self.wait_step_ms)
    }

    pub fn error_color(&self) -> Color {
        Rgba(self.error_color)
    }

    pub fn page_back_color(&self) -> Color {
        Rgba(self.page_back_color)
    }

    /// Fresh slice budget for one engine call
    pub fn slice_budget(&self) -> FrameBudget {
        FrameBudget::new(Duration::from_micros(self.slice_budget_us))
            .with_reserved(Duration::from_micros(self.slice_reserve_us))
    }

    /// Loads configuration from environment variables, starting from defaults.
    ///
    /// Environment variables:
    /// - `PDF_VIEWER_RENDER_POLICY`: `per_page` or `shared_canvas`
    /// - `PDF_VIEWER_INITIAL_WAIT_MS`: starting pacing budget (default: 10)
    /// - `PDF_VIEWER_WAIT_STEP_MS`: pacing increment (default: 10)
    /// - `PDF_VIEWER_SLICE_BUDGET_US`: engine slice per call (default: 16667)
    /// - `PDF_VIEWER_MAX_BITMAP_MB`: largest bitmap in MB (default: 256)
    ///
    /// # Errors
    /// Returns an error if any variable holds an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().apply_env()
    }

    /// Overrides fields that have an environment variable set.
    pub fn apply_env(mut self) -> Result<Self, ConfigError> {
        if let Some(val) = env_var("PDF_VIEWER_RENDER_POLICY") {
            self.target_policy = val.parse()?;
        }
        if let Some(val) = env_var("PDF_VIEWER_INITIAL_WAIT_MS") {
            self.initial_wait_ms = parse_env("PDF_VIEWER_INITIAL_WAIT_MS", &val)?;
        }
        if let Some(val) = env_var("PDF_VIEWER_WAIT_STEP_MS") {
            self.wait_step_ms = parse_env("PDF_VIEWER_WAIT_STEP_MS", &val)?;
        }
        if let Some(val) = env_var("PDF_VIEWER_SLICE_BUDGET_US") {
            self.slice_budget_us = parse_env("PDF_VIEWER_SLICE_BUDGET_US", &val)?;
        }
        if let Some(val) = env_var("PDF_VIEWER_MAX_BITMAP_MB") {
            let mb: usize = parse_env("PDF_VIEWER_MAX_BITMAP_MB", &val)?;
            self.max_bitmap_bytes = mb.saturating_mul(1024 * 1024);
        }
        Ok(self)
    }

    /// Loads configuration from a JSON file. Missing keys keep their defaults.
    ///
    /// ```json
    /// { "target_policy": "shared_canvas", "initial_wait_ms": 20 }
    /// ```
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Saves configuration as pretty-printed JSON.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), json)?;
        Ok(())
    }
}

/// Whole milliseconds, rounded up so a non-zero wait never becomes zero
fn millis_ceil(d: Duration) -> u64 {
    u64::try_from(d.as_micros().div_ceil(1000)).unwrap_or(u64::MAX)
}

fn micros(d: Duration) -> u64 {
    u64::try_from(d.as_micros()).unwrap_or(u64::MAX)
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue(key.to_string()))
}

/// Errors that can occur while loading or saving configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for configuration key: {0}")]
    InvalidValue(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn clear_env() {
        for key in [
            "PDF_VIEWER_RENDER_POLICY",
            "PDF_VIEWER_INITIAL_WAIT_MS",
            "PDF_VIEWER_WAIT_STEP_MS",
            "PDF_VIEWER_SLICE_BUDGET_US",
            "PDF_VIEWER_MAX_BITMAP_MB",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn test_default_config() {
        let config = SchedulerConfig::default();
        assert_eq!(config.target_policy, TargetPolicy::PerPage);
        assert_eq!(config.initial_wait(), Duration::from_millis(10));
        assert_eq!(config.wait_step(), Duration::from_millis(10));
        assert_eq!(config.error_margin, 5);
        assert_eq!(config.error_color(), Rgba([255, 0, 0, 255]));
        assert_eq!(config.max_bitmap_bytes, 256 * 1024 * 1024);
    }

    #[test]
    fn test_default_slice_budget_matches_60fps() {
        let budget = SchedulerConfig::default().slice_budget();
        assert_eq!(budget.budget().as_micros(), FRAME_BUDGET_60FPS.as_micros());
        assert_eq!(budget.reserved(), EVENT_PROCESSING_RESERVE);
    }

    #[test]
    fn test_builder_methods() {
        let config = SchedulerConfig::default()
            .with_target_policy(TargetPolicy::SharedCanvas)
            .with_initial_wait(Duration::from_millis(40))
            .with_wait_step(Duration::from_millis(5))
            .with_render_forms(false)
            .with_max_bitmap_bytes(1024);

        assert_eq!(config.target_policy, TargetPolicy::SharedCanvas);
        assert_eq!(config.initial_wait_ms, 40);
        assert_eq!(config.wait_step_ms, 5);
        assert!(!config.render_forms);
        assert_eq!(config.max_bitmap_bytes, 1024);
    }

    #[test]
    fn test_sub_millisecond_waits_round_up() {
        let config = SchedulerConfig::default()
            .with_initial_wait(Duration::from_micros(500))
            .with_wait_step(Duration::from_micros(10_001));

        assert_eq!(config.initial_wait(), Duration::from_millis(1));
        assert_eq!(config.wait_step(), Duration::from_millis(11));

        let exact = SchedulerConfig::default().with_initial_wait(Duration::from_millis(30));
        assert_eq!(exact.initial_wait_ms, 30);
    }

    #[test]
    fn test_oversized_durations_saturate() {
        let config = SchedulerConfig::default()
            .with_initial_wait(Duration::MAX)
            .with_slice_budget(Duration::MAX, Duration::from_millis(1));

        assert_eq!(config.initial_wait_ms, u64::MAX);
        assert_eq!(config.slice_budget_us, u64::MAX);
        assert_eq!(config.slice_reserve_us, 1000);
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("per_page".parse::<TargetPolicy>().unwrap(), TargetPolicy::PerPage);
        assert_eq!("Shared-Canvas".parse::<TargetPolicy>().unwrap(), TargetPolicy::SharedCanvas);
        assert!("tiles".parse::<TargetPolicy>().is_err());
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear_env();
        env::set_var("PDF_VIEWER_RENDER_POLICY", "shared_canvas");
        env::set_var("PDF_VIEWER_INITIAL_WAIT_MS", "25");
        env::set_var("PDF_VIEWER_MAX_BITMAP_MB", "8");
        env::set_var("PDF_VIEWER_SLICE_BUDGET_US", "8333");

        let config = SchedulerConfig::from_env().unwrap();
        assert_eq!(config.target_policy, TargetPolicy::SharedCanvas);
        assert_eq!(config.initial_wait_ms, 25);
        assert_eq!(config.wait_step_ms, 10);
        assert_eq!(config.max_bitmap_bytes, 8 * 1024 * 1024);
        assert_eq!(config.slice_budget().budget(), Duration::from_micros(8333));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_invalid_value() {
        clear_env();
        env::set_var("PDF_VIEWER_WAIT_STEP_MS", "soon");

        let err = SchedulerConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref key) if key == "PDF_VIEWER_WAIT_STEP_MS"));

        clear_env();
    }

    #[test]
    fn test_file_round_trip_keeps_custom_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scheduler.json");

        let config = SchedulerConfig::default()
            .with_target_policy(TargetPolicy::SharedCanvas)
            .with_wait_step(Duration::from_millis(15));
        config.save_to_file(&path).unwrap();

        let loaded = SchedulerConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.json");
        fs::write(&path, r#"{ "initial_wait_ms": 70 }"#).unwrap();

        let loaded = SchedulerConfig::from_file(&path).unwrap();
        assert_eq!(loaded.initial_wait_ms, 70);
        assert_eq!(loaded.wait_step_ms, 10);
        assert_eq!(loaded.target_policy, TargetPolicy::PerPage);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = SchedulerConfig::from_file("/nonexistent/scheduler.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
