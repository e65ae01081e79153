use crate::pagination::clamp_page_size;
use crate::timeline::{MAX_PERCEPTUAL_LEAD_SECS, TimelineConfig};
use serde::Deserialize;

pub const MIN_TICK_INTERVAL_MS: u64 = 10;
pub const MAX_TICK_INTERVAL_MS: u64 = 1000;

/// Flattened engine configuration; the file groups these into tables.
#[derive(Debug, Clone, PartialEq, Deserialize, serde::Serialize)]
pub struct EngineConfig {
    #[serde(default = "crate::config::defaults::default_loop_queue")]
    pub loop_queue: bool,
    #[serde(default = "crate::config::defaults::default_word_pauses_transport")]
    pub word_pauses_transport: bool,
    #[serde(default = "crate::config::defaults::default_preload_next")]
    pub preload_next: bool,
    #[serde(default = "crate::config::defaults::default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "crate::config::defaults::default_perceptual_lead_secs")]
    pub perceptual_lead_secs: f64,
    #[serde(default = "crate::config::defaults::default_page_size")]
    pub page_size: usize,
    #[serde(default = "crate::config::defaults::default_page_follow")]
    pub page_follow: bool,
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "crate::config::defaults::default_volume")]
    pub volume: f32,
    #[serde(default = "crate::config::defaults::default_log_level")]
    pub log_level: LogLevel,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            loop_queue: crate::config::defaults::default_loop_queue(),
            word_pauses_transport: crate::config::defaults::default_word_pauses_transport(),
            preload_next: crate::config::defaults::default_preload_next(),
            tick_interval_ms: crate::config::defaults::default_tick_interval_ms(),
            perceptual_lead_secs: crate::config::defaults::default_perceptual_lead_secs(),
            page_size: crate::config::defaults::default_page_size(),
            page_follow: crate::config::defaults::default_page_follow(),
            base_url: String::new(),
            volume: crate::config::defaults::default_volume(),
            log_level: crate::config::defaults::default_log_level(),
        }
    }
}

impl EngineConfig {
    /// Bring every numeric setting into its supported range.
    pub fn clamped(mut self) -> Self {
        self.perceptual_lead_secs = if self.perceptual_lead_secs.is_finite() {
            self.perceptual_lead_secs.clamp(0.0, MAX_PERCEPTUAL_LEAD_SECS)
        } else {
            crate::config::defaults::default_perceptual_lead_secs()
        };
        self.page_size = clamp_page_size(self.page_size);
        self.tick_interval_ms = self
            .tick_interval_ms
            .clamp(MIN_TICK_INTERVAL_MS, MAX_TICK_INTERVAL_MS);
        self.volume = if self.volume.is_finite() {
            self.volume.clamp(0.0, 1.0)
        } else {
            crate::config::defaults::default_volume()
        };
        self.base_url = self.base_url.trim().to_string();
        self
    }

    pub fn timeline(&self) -> TimelineConfig {
        TimelineConfig::new(self.perceptual_lead_secs, self.page_size)
    }
}

/// Supported logging verbosity levels.
#[derive(Debug, Clone, Copy, Deserialize, serde::Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_filter_str())
    }
}

impl LogLevel {
    pub fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}
