//! Data models for the LTE simulator.
//!
//! The network types are produced by the orchestrator (which owns the live
//! state) and handed out as snapshots; the device types are produced by the
//! device controller. Everything here is plain data and serializes to JSON
//! for the control portal.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Failure;

// ── Network parameters ──────────────────────────────────────────────

/// Value accepted for `cell_id` / `lac` to request a derived identifier.
pub const AUTO: &str = "auto";

/// User-supplied network parameters, as typed into a form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkParams {
    pub mcc: String,
    pub mnc: String,
    /// Cell id or `auto`.
    pub cell_id: String,
    /// Location area code or `auto`.
    pub lac: String,
    pub band: String,
}

impl Default for NetworkParams {
    fn default() -> Self {
        Self {
            mcc: "456".into(),
            mnc: "06".into(),
            cell_id: AUTO.into(),
            lac: AUTO.into(),
            band: "3".into(),
        }
    }
}

// ── Network configuration ───────────────────────────────────────────

/// Frequency plan, always taken from the band table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyPlan {
    pub band: u16,
    pub dl_earfcn: u32,
    pub ul_earfcn: u32,
    pub center_freq_hz: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RadioParams {
    pub tx_gain: u32,
    pub rx_gain: u32,
    pub bandwidth_mhz: u32,
    /// Physical resource blocks (100 for 20 MHz).
    pub n_prb: u32,
}

impl Default for RadioParams {
    fn default() -> Self {
        Self {
            tx_gain: 50,
            rx_gain: 40,
            bandwidth_mhz: 20,
            n_prb: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityParams {
    pub integrity_algorithm: String,
    pub ciphering_algorithm: String,
}

impl Default for SecurityParams {
    fn default() -> Self {
        Self {
            integrity_algorithm: "EIA1".into(),
            ciphering_algorithm: "EEA0".into(),
        }
    }
}

/// NAS timers in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NasTimers {
    pub t3410: u32,
    pub t3411: u32,
    pub t3402: u32,
}

impl Default for NasTimers {
    fn default() -> Self {
        Self {
            t3410: 15,
            t3411: 10,
            t3402: 12,
        }
    }
}

/// S1 interface bind addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceAddrs {
    pub s1ap_bind_addr: String,
    pub gtpu_bind_addr: String,
    pub mme_addr: String,
}

impl Default for InterfaceAddrs {
    fn default() -> Self {
        Self {
            s1ap_bind_addr: "127.0.1.100".into(),
            gtpu_bind_addr: "127.0.1.1".into(),
            mme_addr: "127.0.1.100".into(),
        }
    }
}

/// Complete, internally consistent network configuration.
///
/// Built once by the generator and never modified; `plmn_id` and the
/// frequency plan are derived, not chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub mcc: u16,
    pub mnc: u16,
    pub plmn_id: String,
    pub cell_id: u32,
    pub lac: u32,
    /// Tracking area code; equal to `lac`.
    pub tac: u32,
    /// Band string as requested by the user.
    pub requested_band: String,
    /// True when `requested_band` was unknown and band 3 was substituted.
    pub band_fallback: bool,
    pub frequency: FrequencyPlan,
    pub radio: RadioParams,
    pub network_name: String,
    pub short_network_name: String,
    pub security: SecurityParams,
    pub timers: NasTimers,
    pub interfaces: InterfaceAddrs,
    pub generated_at: DateTime<Utc>,
}

/// PLMN id as broadcast: MCC followed by the MNC zero-padded to 2 digits.
///
/// The MNC is numeric, so a 3-digit MNC with a leading zero collapses to
/// its 2-digit form: `"006"` and `"06"` both give `45606` for MCC 456.
pub fn plmn_id(mcc: u16, mnc: u16) -> String {
    format!("{mcc:03}{mnc:02}")
}

// ── Orchestrator state ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Failed,
}

impl fmt::Display for NetworkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkState::Stopped => write!(f, "stopped"),
            NetworkState::Starting => write!(f, "starting"),
            NetworkState::Running => write!(f, "running"),
            NetworkState::Stopping => write!(f, "stopping"),
            NetworkState::Failed => write!(f, "failed"),
        }
    }
}

/// Lifecycle of one supervised process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    NotStarted,
    Running,
    Terminating,
    Stopped,
    CrashedUnexpectedly,
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessState::NotStarted => write!(f, "not_started"),
            ProcessState::Running => write!(f, "running"),
            ProcessState::Terminating => write!(f, "terminating"),
            ProcessState::Stopped => write!(f, "stopped"),
            ProcessState::CrashedUnexpectedly => write!(f, "crashed"),
        }
    }
}

/// The two supervised network components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    /// Core network (EPC/MME/HSS/SPGW).
    CoreNetwork,
    /// Base station (eNodeB).
    BaseStation,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::CoreNetwork => write!(f, "core network"),
            Component::BaseStation => write!(f, "base station"),
        }
    }
}

/// Read-only snapshot of the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkStatus {
    pub state: NetworkState,
    pub core_alive: bool,
    pub base_station_alive: bool,
    pub core_pid: Option<u32>,
    pub base_station_pid: Option<u32>,
    pub config: Option<NetworkConfig>,
    /// Most recent start/monitor failure, cleared by the next successful start.
    pub last_error: Option<Failure>,
}

impl Default for NetworkStatus {
    fn default() -> Self {
        Self {
            state: NetworkState::Stopped,
            core_alive: false,
            base_station_alive: false,
            core_pid: None,
            base_station_pid: None,
            config: None,
            last_error: None,
        }
    }
}

// ── Device ──────────────────────────────────────────────────────────

/// One device found by enumeration, as `key → value` fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub fields: BTreeMap<String, String>,
}

impl DeviceInfo {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn serial(&self) -> Option<&str> {
        self.get("serial")
    }

    pub fn product(&self) -> Option<&str> {
        self.get("product")
    }

    pub fn device_type(&self) -> Option<&str> {
        self.get("type")
    }

    pub fn name(&self) -> Option<&str> {
        self.get("name")
    }

    /// Case-insensitive search across all field values.
    pub fn mentions(&self, needle: &str) -> bool {
        let needle = needle.to_ascii_lowercase();
        self.fields
            .values()
            .any(|v| v.to_ascii_lowercase().contains(&needle))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Failed => write!(f, "failed"),
        }
    }
}

/// Logical connection to the radio front end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSession {
    /// UHD device args, e.g. `type=b200,master_clock_rate=23.04e6`.
    pub device_args: String,
    pub connection_state: ConnectionState,
    pub serial: Option<String>,
    pub product: Option<String>,
    pub fpga_version: Option<String>,
    pub firmware_version: Option<String>,
}

impl DeviceSession {
    pub fn new(device_args: impl Into<String>) -> Self {
        Self {
            device_args: device_args.into(),
            connection_state: ConnectionState::Disconnected,
            serial: None,
            product: None,
            fpga_version: None,
            firmware_version: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state == ConnectionState::Connected
    }

    /// Value of `type=` in the device args, e.g. `b200`.
    pub fn device_type(&self) -> Option<&str> {
        self.device_args.split(',').find_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            (key.trim() == "type").then(|| value.trim())
        })
    }
}

/// The device test battery, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceTest {
    HardwareDetection,
    ClockStability,
    TxPath,
    RxPath,
    FrequencyAccuracy,
    GainControl,
}

impl DeviceTest {
    pub const ALL: [DeviceTest; 6] = [
        DeviceTest::HardwareDetection,
        DeviceTest::ClockStability,
        DeviceTest::TxPath,
        DeviceTest::RxPath,
        DeviceTest::FrequencyAccuracy,
        DeviceTest::GainControl,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DeviceTest::HardwareDetection => "Hardware Detection",
            DeviceTest::ClockStability => "Clock Stability",
            DeviceTest::TxPath => "TX Path",
            DeviceTest::RxPath => "RX Path",
            DeviceTest::FrequencyAccuracy => "Frequency Accuracy",
            DeviceTest::GainControl => "Gain Control",
        }
    }
}

impl fmt::Display for DeviceTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    pub test: DeviceTest,
    pub passed: bool,
}

/// Results of one test battery run, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub results: Vec<TestResult>,
}

impl TestOutcome {
    pub fn from_results(results: Vec<TestResult>) -> Self {
        Self { results }
    }

    pub fn get(&self, test: DeviceTest) -> Option<bool> {
        self.results
            .iter()
            .find(|r| r.test == test)
            .map(|r| r.passed)
    }

    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.passed).count()
    }

    pub fn all_passed(&self) -> bool {
        self.results.iter().all(|r| r.passed)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// One frequency of the calibration sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyCheck {
    pub frequency_hz: u64,
    pub passed: bool,
}

/// Per-phase calibration results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub dc_offset: bool,
    pub iq_imbalance: bool,
    pub frequency_sweep: Vec<FrequencyCheck>,
}

impl CalibrationReport {
    pub fn sweep_passed(&self) -> bool {
        self.frequency_sweep.iter().all(|c| c.passed)
    }

    /// All three phases succeeded.
    pub fn passed(&self) -> bool {
        self.dc_offset && self.iq_imbalance && self.sweep_passed()
    }
}
