use crate::error::Error;
use crate::opts::TracerOpts;
use crate::types::{BufferSize, Snaplen, TimestampUnit};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable holding the path of the configuration file.
pub const CONFIG_ENV_VAR: &str = "EBPF_TRACER_CONFIG";

pub const DEFAULT_LOG_MAP_PIN: &str = "/sys/fs/bpf/tracer/log_buffer";

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct TracerConfig {
    /// Enable debug logging
    pub debug: bool,

    /// Where the probe loader pinned the log perf event array
    pub log_map_pin: PathBuf,

    /// Per-CPU log buffer size in bytes
    pub log_buffer_size: BufferSize,

    pub replay: ReplayConfig,
}

impl Default for TracerConfig {
    fn default() -> Self {
        TracerConfig {
            debug: false,
            log_map_pin: PathBuf::from(DEFAULT_LOG_MAP_PIN),
            log_buffer_size: Default::default(),
            replay: Default::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ReplayConfig {
    /// Interface to inject replayed frames into, replay is disabled when unset
    pub interface: Option<String>,

    pub snaplen: Snaplen,

    pub timestamp_unit: TimestampUnit,
}

impl TracerConfig {
    pub fn try_from_file(path: &Path) -> Result<Self, Error> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load the configuration file, if any, and override it with command-line options.
    pub fn load_merge_with_opts(opts: TracerOpts) -> Result<Self, Error> {
        let mut cfg = if let Some(cfg_path) = &opts.config_file {
            Self::try_from_file(cfg_path)?
        } else if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
            Self::try_from_file(Path::new(&env_path))?
        } else {
            TracerConfig::default()
        };

        if opts.debug {
            cfg.debug = true;
        }
        if let Some(pin) = opts.log_map_pin {
            cfg.log_map_pin = pin;
        }
        if let Some(size) = opts.log_buffer_size {
            cfg.log_buffer_size = size;
        }
        if let Some(iface) = opts.replay_interface {
            cfg.replay.interface = iface.into();
        }
        if let Some(snaplen) = opts.snaplen {
            cfg.replay.snaplen = snaplen;
        }
        if let Some(unit) = opts.timestamp_unit {
            cfg.replay.timestamp_unit = unit;
        }

        Ok(cfg)
    }
}
