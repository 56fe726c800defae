//! # Configuration
//!
//! One TOML file shared by both ends, by default
//! `~/.config/servolink/config.toml`. A file with defaults is written on first
//! start so the channel table can be edited in place.
//!
//! ```toml
//! [host]
//! joystick_deadzone = 0.0
//! default_port = 9930
//!
//! [target]
//! bind = "0.0.0.0:9930"
//! period_us = 20000
//! max_pulse_us = 3000
//! sink = "scheduler"
//!
//! [converter]
//! in_min = -32768.0
//! in_max = 32767.0
//! out_min = 1250.0
//! out_max = 2950.0
//!
//! [[channels]]
//! id = 0
//! pin = 17
//! axis = 0
//! ```
//!
//! Everything is validated once at startup by [`Config::validate`]; the rest
//! of the program trusts the values afterwards.

use crate::convert::{ConverterError, RangeConverter};
use crate::pulse::{PinMap, DEFAULT_PERIOD_US};
use crate::snapshot::{ChannelId, SnapshotError, MAX_CHANNELS};
use crate::transport::DEFAULT_PORT;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const CONFIG_DIR: &str = ".config/servolink";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("home directory could not be determined")]
    NoHomeDir,

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("no channels configured")]
    NoChannels,

    #[error("{0} channels configured, at most {max} supported", max = MAX_CHANNELS)]
    TooManyChannels(usize),

    #[error("channel {0} configured more than once")]
    DuplicateChannel(ChannelId),

    #[error("pin {0} bound to more than one channel")]
    DuplicatePin(u8),

    #[error("axis {0} bound to more than one channel")]
    DuplicateAxis(u8),

    #[error("converter: {0}")]
    Converter(#[from] ConverterError),

    #[error("channel table: {0}")]
    Channels(#[from] SnapshotError),

    #[error("max_pulse_us ({max_pulse_us}) must be positive and below period_us ({period_us})")]
    Period { period_us: u32, max_pulse_us: u32 },

    #[error("joystick_deadzone ({0}) must be in 0.0..1.0")]
    Deadzone(f32),
}

/// Sender-side settings
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct HostConfig {
    /// Deadzone applied to gamepad axes read through gilrs, in `0.0..1.0`
    pub joystick_deadzone: f32,
    /// Port used when the target address is given without one
    pub default_port: u16,
    /// Release all channels (send an all-invalid snapshot) on a requested
    /// shutdown. Losing the input never releases.
    pub release_on_exit: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            joystick_deadzone: 0.0,
            default_port: DEFAULT_PORT,
            release_on_exit: false,
        }
    }
}

/// Where the target delivers converted snapshots
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// In-process pulse scheduler driving GPIO pins
    #[default]
    Scheduler,
    /// Write-only character device provided by a kernel driver
    Device,
}

/// Receiver-side settings
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct TargetConfig {
    pub bind: SocketAddr,
    pub period_us: u32,
    /// Upper bound for any pulse, protects servos from runaway widths
    pub max_pulse_us: u32,
    /// How early the scheduler wakes before a period boundary to spin
    pub spin_margin_us: u32,
    pub sink: SinkKind,
    pub device_path: PathBuf,
    /// Use a pin bank that discards writes instead of GPIO
    pub dry_run: bool,
    pub run_diagnostics: bool,
    pub diagnostics_dwell_ms: u64,
    pub stats_interval_secs: u64,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            period_us: DEFAULT_PERIOD_US,
            max_pulse_us: 3_000,
            spin_margin_us: 1_000,
            sink: SinkKind::Scheduler,
            device_path: PathBuf::from("/dev/servoctrl0"),
            dry_run: false,
            run_diagnostics: false,
            diagnostics_dwell_ms: 3_000,
            stats_interval_secs: 10,
        }
    }
}

/// One servo channel: identity, output pin and the joystick axis driving it
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelBinding {
    pub id: ChannelId,
    pub pin: u8,
    pub axis: u8,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Config {
    pub host: HostConfig,
    pub target: TargetConfig,
    pub converter: RangeConverter,
    pub channels: Vec<ChannelBinding>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: HostConfig::default(),
            target: TargetConfig::default(),
            converter: RangeConverter::default(),
            channels: vec![
                ChannelBinding {
                    id: ChannelId::A,
                    pin: 17,
                    axis: 0,
                },
                ChannelBinding {
                    id: ChannelId::B,
                    pin: 27,
                    axis: 1,
                },
            ],
        }
    }
}

impl Config {
    /// `~/.config/servolink/config.toml`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let mut path = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        Ok(path)
    }

    /// Writes the default configuration to `path` unless a file exists.
    pub async fn ensure_default_config(path: &Path) -> Result<(), ConfigError> {
        let exists = tokio::fs::try_exists(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        if exists {
            debug!("Configuration found at {}", path.display());
            return Ok(());
        }

        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| ConfigError::Io {
                    path: dir.to_path_buf(),
                    source,
                })?;
        }
        let content = toml::to_string_pretty(&Config::default())?;
        tokio::fs::write(path, content)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        info!("Wrote default configuration to {}", path.display());
        Ok(())
    }

    /// Reads, parses and validates the file at `path`.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let config = Self::from_toml(&content).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        info!(
            "Loaded configuration from {} ({} channels)",
            path.display(),
            config.channels.len()
        );
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channels.is_empty() {
            return Err(ConfigError::NoChannels);
        }
        if self.channels.len() > MAX_CHANNELS {
            return Err(ConfigError::TooManyChannels(self.channels.len()));
        }

        let mut ids = HashSet::new();
        let mut pins = HashSet::new();
        let mut axes = HashSet::new();
        for binding in &self.channels {
            if !ids.insert(binding.id) {
                return Err(ConfigError::DuplicateChannel(binding.id));
            }
            if !pins.insert(binding.pin) {
                return Err(ConfigError::DuplicatePin(binding.pin));
            }
            if !axes.insert(binding.axis) {
                return Err(ConfigError::DuplicateAxis(binding.axis));
            }
        }

        self.converter.validate()?;

        let deadzone = self.host.joystick_deadzone;
        if !(0.0..1.0).contains(&deadzone) {
            return Err(ConfigError::Deadzone(deadzone));
        }

        let target = &self.target;
        if target.max_pulse_us == 0 || target.max_pulse_us >= target.period_us {
            return Err(ConfigError::Period {
                period_us: target.period_us,
                max_pulse_us: target.max_pulse_us,
            });
        }
        Ok(())
    }

    pub fn channel_ids(&self) -> impl Iterator<Item = ChannelId> + '_ {
        self.channels.iter().map(|b| b.id)
    }

    /// Channel driven by joystick `axis`, if any
    pub fn channel_for_axis(&self, axis: u8) -> Option<ChannelId> {
        self.channels
            .iter()
            .find(|b| b.axis == axis)
            .map(|b| b.id)
    }

    pub fn pin_map(&self) -> PinMap {
        PinMap::new(self.channels.iter().map(|b| (b.id, b.pin)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.channel_for_axis(0), Some(ChannelId::A));
        assert_eq!(config.channel_for_axis(1), Some(ChannelId::B));
        assert_eq!(config.channel_for_axis(2), None);
        assert_eq!(config.pin_map().pin_for(ChannelId::B), Some(27));
    }

    #[test]
    fn toml_round_trip_of_defaults() {
        let content = toml::to_string_pretty(&Config::default()).unwrap();
        let parsed = Config::from_toml(&content).unwrap();
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let parsed = Config::from_toml(
            r#"
            [converter]
            out_min = 1500.0

            [[channels]]
            id = 3
            pin = 22
            axis = 4
            "#,
        )
        .unwrap();
        assert_eq!(parsed.converter.out_min, 1500.0);
        assert_eq!(parsed.converter.in_min, -32768.0);
        assert_eq!(parsed.target.period_us, DEFAULT_PERIOD_US);
        assert_eq!(parsed.channel_for_axis(4), Some(ChannelId::new(3)));
    }

    #[test]
    fn rejects_duplicate_pins() {
        let mut config = Config::default();
        config.channels[1].pin = config.channels[0].pin;
        assert!(matches!(config.validate(), Err(ConfigError::DuplicatePin(17))));
    }

    #[test]
    fn rejects_duplicate_channels_and_axes() {
        let mut config = Config::default();
        config.channels[1].id = ChannelId::A;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateChannel(ChannelId::A))
        ));

        let mut config = Config::default();
        config.channels[1].axis = 0;
        assert!(matches!(config.validate(), Err(ConfigError::DuplicateAxis(0))));
    }

    #[test]
    fn rejects_channel_overflow() {
        let mut config = Config::default();
        config.channels = (0..=MAX_CHANNELS as u8)
            .map(|n| ChannelBinding {
                id: ChannelId::new(n),
                pin: n,
                axis: n,
            })
            .collect();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TooManyChannels(n)) if n == MAX_CHANNELS + 1
        ));
    }

    #[test]
    fn rejects_pulse_longer_than_period() {
        let mut config = Config::default();
        config.target.max_pulse_us = config.target.period_us;
        assert!(matches!(config.validate(), Err(ConfigError::Period { .. })));
    }

    #[test]
    fn rejects_inverted_converter() {
        let mut config = Config::default();
        config.converter.in_max = config.converter.in_min;
        assert!(matches!(config.validate(), Err(ConfigError::Converter(_))));
    }

    #[test]
    fn rejects_deadzone_outside_unit_range() {
        let mut config = Config::default();
        for deadzone in [1.0, 1.5, -0.1, f32::NAN] {
            config.host.joystick_deadzone = deadzone;
            assert!(matches!(config.validate(), Err(ConfigError::Deadzone(_))));
        }
        config.host.joystick_deadzone = 0.95;
        config.validate().unwrap();
    }

    #[tokio::test]
    async fn ensure_default_then_load() {
        let dir = std::env::temp_dir().join(format!("servolink-config-{}", std::process::id()));
        let path = dir.join("nested").join(CONFIG_FILE);
        let _ = tokio::fs::remove_dir_all(&dir).await;

        Config::ensure_default_config(&path).await.unwrap();
        let loaded = Config::load(&path).await.unwrap();
        assert_eq!(loaded, Config::default());

        // existing files are left alone
        tokio::fs::write(&path, "[target]\nperiod_us = 25000\n")
            .await
            .unwrap();
        Config::ensure_default_config(&path).await.unwrap();
        let loaded = Config::load(&path).await.unwrap();
        assert_eq!(loaded.target.period_us, 25_000);

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let path = std::env::temp_dir().join("servolink-definitely-missing.toml");
        assert!(matches!(
            Config::load(&path).await,
            Err(ConfigError::Io { .. })
        ));
    }
}
