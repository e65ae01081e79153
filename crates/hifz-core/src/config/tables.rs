use super::defaults;
use super::models::{EngineConfig, LogLevel};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize, serde::Serialize)]
pub(super) struct ConfigTables {
    #[serde(default)]
    playback: PlaybackConfig,
    #[serde(default)]
    timeline: TimelineTable,
    #[serde(default)]
    audio: AudioConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

impl From<ConfigTables> for EngineConfig {
    fn from(tables: ConfigTables) -> Self {
        EngineConfig {
            loop_queue: tables.playback.loop_queue,
            word_pauses_transport: tables.playback.word_pauses_transport,
            preload_next: tables.playback.preload_next,
            tick_interval_ms: tables.playback.tick_interval_ms,
            perceptual_lead_secs: tables.timeline.perceptual_lead_secs,
            page_size: tables.timeline.page_size,
            page_follow: tables.timeline.page_follow,
            base_url: tables.audio.base_url,
            volume: tables.audio.volume,
            log_level: tables.logging.log_level,
        }
    }
}

impl From<&EngineConfig> for ConfigTables {
    fn from(config: &EngineConfig) -> Self {
        ConfigTables {
            playback: PlaybackConfig {
                loop_queue: config.loop_queue,
                word_pauses_transport: config.word_pauses_transport,
                preload_next: config.preload_next,
                tick_interval_ms: config.tick_interval_ms,
            },
            timeline: TimelineTable {
                perceptual_lead_secs: config.perceptual_lead_secs,
                page_size: config.page_size,
                page_follow: config.page_follow,
            },
            audio: AudioConfig {
                base_url: config.base_url.clone(),
                volume: config.volume,
            },
            logging: LoggingConfig {
                log_level: config.log_level,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct PlaybackConfig {
    #[serde(default = "defaults::default_loop_queue")]
    loop_queue: bool,
    #[serde(default = "defaults::default_word_pauses_transport")]
    word_pauses_transport: bool,
    #[serde(default = "defaults::default_preload_next")]
    preload_next: bool,
    #[serde(default = "defaults::default_tick_interval_ms")]
    tick_interval_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        PlaybackConfig {
            loop_queue: defaults::default_loop_queue(),
            word_pauses_transport: defaults::default_word_pauses_transport(),
            preload_next: defaults::default_preload_next(),
            tick_interval_ms: defaults::default_tick_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct TimelineTable {
    #[serde(default = "defaults::default_perceptual_lead_secs")]
    perceptual_lead_secs: f64,
    #[serde(default = "defaults::default_page_size")]
    page_size: usize,
    #[serde(default = "defaults::default_page_follow")]
    page_follow: bool,
}

impl Default for TimelineTable {
    fn default() -> Self {
        TimelineTable {
            perceptual_lead_secs: defaults::default_perceptual_lead_secs(),
            page_size: defaults::default_page_size(),
            page_follow: defaults::default_page_follow(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct AudioConfig {
    #[serde(default)]
    base_url: String,
    #[serde(default = "defaults::default_volume")]
    volume: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        AudioConfig {
            base_url: String::new(),
            volume: defaults::default_volume(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct LoggingConfig {
    #[serde(default = "defaults::default_log_level")]
    log_level: LogLevel,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            log_level: defaults::default_log_level(),
        }
    }
}
