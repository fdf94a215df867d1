//! Handles configuration loading and management.
//!
//! This module defines `SiteConfig`, which holds the hero video settings and the
//! scroll-reveal observer settings. `load_config` reads them from an INI file;
//! `parse_config` does the same from a string. Optional keys fall back to the
//! page's built-in defaults.
//!
//! ```ini
//! [video]
//! base_path = assets/videos/
//! order = hero, analytics, errorHandler
//! terminal_key = analytics
//! rotation_interval_ms = 10000
//!
//! [video.files]
//! hero = hero-video.mp4
//! analytics = analytics.mp4
//! errorHandler = error_handler.mp4
//!
//! [observer]
//! threshold = 0.1
//! root_margin = 0px 0px -50px 0px
//! ```

use crate::errors::{CatalogError, ConfigError};
use crate::model::AssetCycle;
use configparser::ini::Ini;
use log::{debug, error, info};
use std::time::Duration;

const VIDEO: &str = "video";
const VIDEO_FILES: &str = "video.files";
const OBSERVER: &str = "observer";

/// Settings for the hero video rotation.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoConfig {
    pub base_path: String,
    /// `(key, filename)` pairs in rotation order.
    pub files: Vec<(String, String)>,
    pub terminal_key: Option<String>,
    /// Dwell time of every non-terminal asset.
    pub rotation_interval: Duration,
    pub fade_duration: Duration,
    /// Added to the fade duration to get the near-end lead time.
    pub lead_buffer: Duration,
    pub watch_interval: Duration,
    pub play_timeout: Duration,
    /// Fallback advance for a terminal asset whose end never arrives. `None` stalls.
    pub terminal_max_wait: Option<Duration>,
    pub default_opacity: f32,
    pub near_end_watch: bool,
    /// When set, the next asset is also fetched over HTTP from this origin.
    pub prefetch_origin: Option<String>,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            base_path: "assets/videos/".to_string(),
            files: vec![
                ("hero".to_string(), "hero-video.mp4".to_string()),
                ("analytics".to_string(), "analytics.mp4".to_string()),
                ("errorhandler".to_string(), "error_handler.mp4".to_string()),
            ],
            terminal_key: Some("analytics".to_string()),
            rotation_interval: Duration::from_millis(10_000),
            fade_duration: Duration::from_millis(800),
            lead_buffer: Duration::from_millis(400),
            watch_interval: Duration::from_millis(250),
            play_timeout: Duration::from_millis(5_000),
            terminal_max_wait: None,
            default_opacity: 0.5,
            near_end_watch: true,
            prefetch_origin: None,
        }
    }
}

impl VideoConfig {
    /// How long before natural end the near-end watch triggers.
    pub fn transition_lead(&self) -> Duration {
        self.fade_duration + self.lead_buffer
    }

    /// Builds the asset catalog described by this configuration.
    pub fn catalog(&self) -> Result<AssetCycle, CatalogError> {
        AssetCycle::new(&self.base_path, self.files.iter().cloned(), self.terminal_key.as_deref())
    }
}

/// Settings for the scroll-reveal observer.
#[derive(Clone, Debug, PartialEq)]
pub struct ObserverConfig {
    pub threshold: f32,
    pub root_margin: String,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self { threshold: 0.1, root_margin: "0px 0px -50px 0px".to_string() }
    }
}

/// Holds the site's enhancement configuration.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SiteConfig {
    pub video: VideoConfig,
    pub observer: ObserverConfig,
}

/// Loads configuration from the specified INI file path.
///
/// # Errors
/// Returns `ConfigError` if the file cannot be read, is malformed,
/// or if essential keys are missing.
#[must_use = "loading configuration can fail, the Result must be handled"]
pub fn load_config(path: &str) -> Result<SiteConfig, ConfigError> {
    info!("Attempting to load config from: {}", path);
    let text = std::fs::read_to_string(path).map_err(|e| {
        error!("Error reading config file '{}': {}", path, e);
        ConfigError::Io(e)
    })?;
    let config = parse_config(&text)?;
    info!("Configuration loaded successfully from {}: {:?}", path, config);
    Ok(config)
}

/// Parses configuration from INI text.
///
/// Keys and section names are case-insensitive; asset keys are therefore
/// normalised to lowercase.
#[must_use = "parsing configuration can fail, the Result must be handled"]
pub fn parse_config(text: &str) -> Result<SiteConfig, ConfigError> {
    let mut ini = Ini::new();
    ini.read(text.to_string()).map_err(|e| {
        error!("Error parsing config: {}", e);
        ConfigError::Parse(e)
    })?;

    let required = |section: &str, key: &str| {
        ini.get(section, key).filter(|v| !v.trim().is_empty()).ok_or_else(|| {
            error!("Missing configuration key '{}' in section '[{}]'", key, section);
            ConfigError::MissingKey(format!("{}.{}", section, key))
        })
    };

    let base_path = required(VIDEO, "base_path")?;
    let order = required(VIDEO, "order")?;
    let mut files = Vec::new();
    for key in order.split(',').map(|k| k.trim().to_lowercase()).filter(|k| !k.is_empty()) {
        let filename = required(VIDEO_FILES, &key)?;
        debug!("Loaded video file mapping '{}' -> '{}'", key, filename);
        files.push((key, filename));
    }

    let defaults = VideoConfig::default();
    let video = VideoConfig {
        base_path,
        files,
        terminal_key: ini.get(VIDEO, "terminal_key").map(|k| k.trim().to_lowercase()).filter(|k| !k.is_empty()),
        rotation_interval: millis_or(&ini, VIDEO, "rotation_interval_ms", defaults.rotation_interval)?,
        fade_duration: millis_or(&ini, VIDEO, "fade_duration_ms", defaults.fade_duration)?,
        lead_buffer: millis_or(&ini, VIDEO, "lead_buffer_ms", defaults.lead_buffer)?,
        watch_interval: millis_or(&ini, VIDEO, "watch_interval_ms", defaults.watch_interval)?,
        play_timeout: millis_or(&ini, VIDEO, "play_timeout_ms", defaults.play_timeout)?,
        terminal_max_wait: optional_millis(&ini, VIDEO, "terminal_max_wait_ms")?,
        default_opacity: float_or(&ini, VIDEO, "default_opacity", defaults.default_opacity)?,
        near_end_watch: ini
            .getbool(VIDEO, "near_end_watch")
            .map_err(|reason| invalid(VIDEO, "near_end_watch", reason))?
            .unwrap_or(defaults.near_end_watch),
        prefetch_origin: ini.get(VIDEO, "prefetch_origin").filter(|v| !v.trim().is_empty()),
    };
    if video.watch_interval.is_zero() {
        return Err(invalid(VIDEO, "watch_interval_ms", "must be greater than zero".into()));
    }
    if !(0.0..=1.0).contains(&video.default_opacity) {
        return Err(invalid(VIDEO, "default_opacity", "must be within 0.0..=1.0".into()));
    }

    let observer_defaults = ObserverConfig::default();
    let observer = ObserverConfig {
        threshold: float_or(&ini, OBSERVER, "threshold", observer_defaults.threshold)?,
        root_margin: ini.get(OBSERVER, "root_margin").unwrap_or(observer_defaults.root_margin),
    };

    Ok(SiteConfig { video, observer })
}

fn invalid(section: &str, key: &str, reason: String) -> ConfigError {
    error!("Invalid configuration value for '{}.{}': {}", section, key, reason);
    ConfigError::Invalid { key: format!("{}.{}", section, key), reason }
}

fn optional_millis(ini: &Ini, section: &str, key: &str) -> Result<Option<Duration>, ConfigError> {
    let value = ini.getuint(section, key).map_err(|reason| invalid(section, key, reason))?;
    Ok(value.map(Duration::from_millis))
}

fn millis_or(ini: &Ini, section: &str, key: &str, default: Duration) -> Result<Duration, ConfigError> {
    Ok(optional_millis(ini, section, key)?.unwrap_or(default))
}

fn float_or(ini: &Ini, section: &str, key: &str, default: f32) -> Result<f32, ConfigError> {
    let value = ini.getfloat(section, key).map_err(|reason| invalid(section, key, reason))?;
    Ok(value.map_or(default, |v| v as f32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "\
[video]
base_path = media/
order = primary, secondary, tertiary
terminal_key = secondary
rotation_interval_ms = 5000
terminal_max_wait_ms = 60000

[video.files]
primary = a.mp4
secondary = b.mp4
tertiary = c.mp4

[observer]
threshold = 0.25
";

    #[test]
    fn parses_full_sample() {
        let config = parse_config(SAMPLE).unwrap();
        assert_eq!(config.video.base_path, "media/");
        assert_eq!(config.video.files[1], ("secondary".to_string(), "b.mp4".to_string()));
        assert_eq!(config.video.terminal_key.as_deref(), Some("secondary"));
        assert_eq!(config.video.rotation_interval, Duration::from_secs(5));
        assert_eq!(config.video.fade_duration, Duration::from_millis(800));
        assert_eq!(config.video.terminal_max_wait, Some(Duration::from_secs(60)));
        assert_eq!(config.video.transition_lead(), Duration::from_millis(1200));
        assert!((config.observer.threshold - 0.25).abs() < f32::EPSILON);
        assert_eq!(config.observer.root_margin, "0px 0px -50px 0px");

        let catalog = config.video.catalog().unwrap();
        assert_eq!(catalog.resolve("tertiary"), Some("media/c.mp4"));
        assert_eq!(catalog.terminal_index(), Some(1));
    }

    #[test]
    fn missing_file_mapping_is_reported() {
        let text = "[video]\nbase_path = m/\norder = a, b\n[video.files]\na = a.mp4\n";
        match parse_config(text) {
            Err(ConfigError::MissingKey(key)) => assert_eq!(key, "video.files.b"),
            other => panic!("expected MissingKey, got {:?}", other),
        }
    }

    #[test]
    fn malformed_number_is_invalid() {
        let text = "[video]\nbase_path = m/\norder = a\nfade_duration_ms = soon\n[video.files]\na = a.mp4\n";
        assert!(matches!(parse_config(text), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn load_config_reads_file_and_reports_io_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let path = file.path().to_str().unwrap().to_string();
        assert_eq!(load_config(&path).unwrap().video.files.len(), 3);

        let missing = format!("{}.absent", path);
        assert!(matches!(load_config(&missing), Err(ConfigError::Io(_))));
    }

    #[test]
    fn defaults_build_a_valid_catalog() {
        let catalog = SiteConfig::default().video.catalog().unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.resolve("analytics"), Some("assets/videos/analytics.mp4"));
    }
}
