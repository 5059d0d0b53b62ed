//! Agent settings, loaded from an optional TOML file.
//!
//! ```toml
//! [paths]
//! config_dir = "/opt/lte-simulator/config"
//! log_dir = "/opt/lte-simulator/logs"
//! data_dir = "/opt/lte-simulator/data"
//!
//! [network]
//! core_bin = "srsepc"
//! base_station_bin = "srsenb"
//! settle_delay_ms = 2000
//! grace_period_ms = 5000
//! monitor_interval_ms = 500
//!
//! [device]
//! device_args = "type=b200,master_clock_rate=23.04e6"
//! probe = "uhd_usrp_probe"
//! scratch_dir = "/tmp"
//! ```
//!
//! Every key is optional; missing keys take the defaults shown above.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::supervisor::DEFAULT_GRACE_PERIOD;

pub const DEFAULT_DEVICE_ARGS: &str = "type=b200,master_clock_rate=23.04e6";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SettingsInput {
    pub paths: PathsInput,
    pub network: NetworkInput,
    pub device: DeviceInput,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PathsInput {
    pub config_dir: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NetworkInput {
    pub core_bin: Option<String>,
    pub base_station_bin: Option<String>,
    pub settle_delay_ms: Option<u64>,
    pub grace_period_ms: Option<u64>,
    pub monitor_interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DeviceInput {
    pub device_args: Option<String>,
    pub find_devices: Option<String>,
    pub probe: Option<String>,
    pub rx_capture: Option<String>,
    pub tx_waveform: Option<String>,
    pub rx_iq_calibration: Option<String>,
    pub tx_iq_calibration: Option<String>,
    pub clock_check: Option<String>,
    pub scratch_dir: Option<PathBuf>,
}

/// Directory layout for rendered configs, process logs and persisted state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub config_dir: PathBuf,
    pub log_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self::under("/opt/lte-simulator")
    }
}

impl Paths {
    /// `config/`, `logs/` and `data/` below `root`.
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            config_dir: root.join("config"),
            log_dir: root.join("logs"),
            data_dir: root.join("data"),
        }
    }

    pub fn epc_conf(&self) -> PathBuf {
        self.config_dir.join("epc.conf")
    }

    pub fn enb_conf(&self) -> PathBuf {
        self.config_dir.join("enb.conf")
    }

    /// Cell list consumed by the eNodeB.
    pub fn cell_csv(&self) -> PathBuf {
        self.config_dir.join("enb.csv")
    }

    /// HSS subscriber database.
    pub fn user_db(&self) -> PathBuf {
        self.config_dir.join("user_db.csv")
    }

    pub fn current_config_json(&self) -> PathBuf {
        self.data_dir.join("current_config.json")
    }

    /// Combined stdout/stderr of the core network process.
    pub fn core_process_log(&self) -> PathBuf {
        self.log_dir.join("epc_process.log")
    }

    /// Combined stdout/stderr of the base station process.
    pub fn base_station_process_log(&self) -> PathBuf {
        self.log_dir.join("enb_process.log")
    }
}

#[derive(Debug, Clone)]
pub struct NetworkSettings {
    pub core_bin: String,
    pub base_station_bin: String,
    /// Pause after each process start before moving on.
    pub settle_delay: Duration,
    /// How long a process gets to exit after SIGTERM.
    pub grace_period: Duration,
    /// Liveness poll period while the network is running.
    pub monitor_interval: Duration,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            core_bin: "srsepc".into(),
            base_station_bin: "srsenb".into(),
            settle_delay: Duration::from_secs(2),
            grace_period: DEFAULT_GRACE_PERIOD,
            monitor_interval: Duration::from_millis(500),
        }
    }
}

/// Executables used by the device controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTools {
    pub find_devices: String,
    pub probe: String,
    pub rx_capture: String,
    pub tx_waveform: String,
    pub rx_iq_calibration: String,
    pub tx_iq_calibration: String,
    /// Interpreter for the UHD clock check script.
    pub clock_check: String,
}

impl Default for DeviceTools {
    fn default() -> Self {
        Self {
            find_devices: "uhd_find_devices".into(),
            probe: "uhd_usrp_probe".into(),
            rx_capture: "rx_samples_to_file".into(),
            tx_waveform: "tx_waveforms".into(),
            rx_iq_calibration: "uhd_cal_rx_iq_balance".into(),
            tx_iq_calibration: "uhd_cal_tx_iq_balance".into(),
            clock_check: "python3".into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeviceSettings {
    pub device_args: String,
    pub tools: DeviceTools,
    /// Where tool output captures and sample files are created.
    pub scratch_dir: PathBuf,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            device_args: DEFAULT_DEVICE_ARGS.into(),
            tools: DeviceTools::default(),
            scratch_dir: std::env::temp_dir(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub paths: Paths,
    pub network: NetworkSettings,
    pub device: DeviceSettings,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

impl SettingsInput {
    pub fn resolve(self) -> Result<Settings, String> {
        let paths_default = Paths::default();
        let paths = Paths {
            config_dir: self.paths.config_dir.unwrap_or(paths_default.config_dir),
            log_dir: self.paths.log_dir.unwrap_or(paths_default.log_dir),
            data_dir: self.paths.data_dir.unwrap_or(paths_default.data_dir),
        };

        let net_default = NetworkSettings::default();
        let monitor_ms = self
            .network
            .monitor_interval_ms
            .unwrap_or(net_default.monitor_interval.as_millis() as u64);
        if monitor_ms == 0 {
            return Err("network.monitor_interval_ms must be greater than zero".into());
        }
        let network = NetworkSettings {
            core_bin: non_empty(self.network.core_bin).unwrap_or(net_default.core_bin),
            base_station_bin: non_empty(self.network.base_station_bin)
                .unwrap_or(net_default.base_station_bin),
            settle_delay: self
                .network
                .settle_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(net_default.settle_delay),
            grace_period: self
                .network
                .grace_period_ms
                .map(Duration::from_millis)
                .unwrap_or(net_default.grace_period),
            monitor_interval: Duration::from_millis(monitor_ms),
        };

        let tools_default = DeviceTools::default();
        let d = self.device;
        let device = DeviceSettings {
            device_args: non_empty(d.device_args).unwrap_or_else(|| DEFAULT_DEVICE_ARGS.into()),
            tools: DeviceTools {
                find_devices: non_empty(d.find_devices).unwrap_or(tools_default.find_devices),
                probe: non_empty(d.probe).unwrap_or(tools_default.probe),
                rx_capture: non_empty(d.rx_capture).unwrap_or(tools_default.rx_capture),
                tx_waveform: non_empty(d.tx_waveform).unwrap_or(tools_default.tx_waveform),
                rx_iq_calibration: non_empty(d.rx_iq_calibration)
                    .unwrap_or(tools_default.rx_iq_calibration),
                tx_iq_calibration: non_empty(d.tx_iq_calibration)
                    .unwrap_or(tools_default.tx_iq_calibration),
                clock_check: non_empty(d.clock_check).unwrap_or(tools_default.clock_check),
            },
            scratch_dir: d.scratch_dir.unwrap_or_else(std::env::temp_dir),
        };

        Ok(Settings {
            paths,
            network,
            device,
        })
    }
}

impl Settings {
    pub fn from_toml_str(input: &str) -> Result<Self, String> {
        if input.trim().is_empty() {
            return Ok(Settings::default());
        }
        let parsed: SettingsInput =
            toml::from_str(input).map_err(|e| format!("Invalid settings TOML: {}", e))?;
        parsed.resolve()
    }

    /// Load settings from `path`, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, String> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
                Self::from_toml_str(&text)
            }
            None => Ok(Settings::default()),
        }
    }
}
