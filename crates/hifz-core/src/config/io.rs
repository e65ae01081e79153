use super::models::EngineConfig;
use super::tables::ConfigTables;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Load configuration from `path`, falling back to defaults on any problem.
pub fn load_config(path: &Path) -> EngineConfig {
    let contents = match fs::read_to_string(path) {
        Ok(data) => {
            info!(path = %path.display(), "Loaded base config");
            data
        }
        Err(err) => {
            warn!(
                path = %path.display(),
                "Falling back to default config: {err}"
            );
            return EngineConfig::default();
        }
    };

    match parse_config(&contents) {
        Ok(cfg) => {
            debug!("Parsed configuration from disk");
            cfg
        }
        Err(err) => {
            warn!(path = %path.display(), "Invalid config TOML: {err}");
            EngineConfig::default()
        }
    }
}

/// Parse the sectioned TOML layout and clamp values into range.
pub fn parse_config(contents: &str) -> Result<EngineConfig, toml::de::Error> {
    let tables: ConfigTables = toml::from_str(contents)?;
    Ok(EngineConfig::from(tables).clamped())
}

pub fn serialize_config(config: &EngineConfig) -> Result<String, toml::ser::Error> {
    toml::to_string_pretty(&ConfigTables::from(config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn empty_file_yields_defaults() {
        let cfg = parse_config("").unwrap();
        assert_eq!(cfg, EngineConfig::default());
        assert!(cfg.word_pauses_transport);
        assert_eq!(cfg.page_size, 10);
        assert!((cfg.perceptual_lead_secs - 0.2).abs() < 1e-9);
    }

    #[test]
    fn tables_map_onto_flat_fields() {
        let cfg = parse_config(
            r#"
            [playback]
            loop_queue = true
            tick_interval_ms = 100

            [timeline]
            perceptual_lead_secs = 0.35
            page_follow = false

            [audio]
            base_url = " https://verses.example/ "

            [logging]
            log_level = "debug"
            "#,
        )
        .unwrap();
        assert!(cfg.loop_queue);
        assert_eq!(cfg.tick_interval_ms, 100);
        assert!((cfg.perceptual_lead_secs - 0.35).abs() < 1e-9);
        assert!(!cfg.page_follow);
        assert_eq!(cfg.base_url, "https://verses.example/");
        assert_eq!(cfg.log_level, LogLevel::Debug);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let cfg = parse_config(
            r#"
            [playback]
            tick_interval_ms = 1

            [timeline]
            perceptual_lead_secs = -3.0
            page_size = 500

            [audio]
            volume = 4.0
            "#,
        )
        .unwrap();
        assert_eq!(cfg.tick_interval_ms, 10);
        assert_eq!(cfg.perceptual_lead_secs, 0.0);
        assert_eq!(cfg.page_size, 50);
        assert_eq!(cfg.volume, 1.0);
    }

    #[test]
    fn invalid_toml_is_an_error_and_missing_file_defaults() {
        assert!(parse_config("[playback\nloop_queue = ").is_err());
        let cfg = load_config(Path::new("/nonexistent/hifz/config.toml"));
        assert_eq!(cfg, EngineConfig::default());
    }

    #[test]
    fn serialized_config_parses_back() {
        let cfg = EngineConfig {
            loop_queue: true,
            page_size: 7,
            ..EngineConfig::default()
        };
        let text = serialize_config(&cfg).unwrap();
        assert!(text.contains("[playback]"));
        assert_eq!(parse_config(&text).unwrap(), cfg);
    }
}
