//! SDR device lifecycle: discover, connect, test, calibrate.
//!
//! All hardware access goes through the UHD command-line tools, each run
//! with its own deadline via [`tools::ToolRunner`]. A test or calibration
//! step that fails is recorded and the sequence carries on.

pub mod parse;
pub mod tools;

use std::time::Duration;

use ltesim_common::models::{
    CalibrationReport, ConnectionState, DeviceInfo, DeviceSession, DeviceTest, FrequencyCheck,
    TestOutcome, TestResult,
};
use ltesim_common::{Error, ErrorKind, Result};

use crate::settings::{DeviceSettings, DeviceTools};
use tools::{BOUNDED, SUCCESS_ONLY, ToolRunner, with_device_args};

// ── Test parameters ─────────────────────────────────────────────────

pub const TEST_FREQ_HZ: u64 = 1_800_000_000;
pub const SAMPLE_RATE: &str = "1000000";
/// Device type assumed when the args carry no `type=`.
pub const DEFAULT_DEVICE_TYPE: &str = "b200";
pub const CLOCK_CHECK_PASSED: &str = "Clock test passed";

pub const GAIN_STEPS: [u32; 4] = [0, 25, 50, 75];
pub const SWEEP_FREQS_HZ: [u64; 3] = [900_000_000, 1_800_000_000, 2_100_000_000];

const DISCOVER_TIMEOUT: Duration = Duration::from_secs(30);
const PROBE_TIMEOUT: Duration = Duration::from_secs(30);
const SMOKE_TIMEOUT: Duration = Duration::from_secs(2);
const CLOCK_TIMEOUT: Duration = Duration::from_secs(10);
const TX_TIMEOUT: Duration = Duration::from_secs(5);
const RX_TIMEOUT: Duration = Duration::from_secs(3);
const GAIN_TIMEOUT: Duration = Duration::from_secs(2);
const CALIBRATION_TIMEOUT: Duration = Duration::from_secs(30);
const SWEEP_TIMEOUT: Duration = Duration::from_secs(3);

/// One receive capture.
struct Capture {
    freq_hz: u64,
    gain: u32,
    duration: &'static str,
    limit: Duration,
}

pub struct DeviceController {
    default_args: String,
    tools: DeviceTools,
    runner: ToolRunner,
    session: DeviceSession,
}

impl DeviceController {
    pub fn new(settings: &DeviceSettings) -> Self {
        Self {
            default_args: settings.device_args.clone(),
            tools: settings.tools.clone(),
            runner: ToolRunner::new(settings.scratch_dir.clone()),
            session: DeviceSession::new(settings.device_args.clone()),
        }
    }

    pub fn session(&self) -> &DeviceSession {
        &self.session
    }

    /// Enumerate attached devices. Any failure yields an empty list.
    pub async fn discover(&self) -> Vec<DeviceInfo> {
        let run = match self
            .runner
            .invoke(&self.tools.find_devices, &[], DISCOVER_TIMEOUT)
            .await
        {
            Ok(run) => run,
            Err(e) => {
                tracing::error!(error = %e, "device enumeration failed");
                return Vec::new();
            }
        };
        if !run.accepted(SUCCESS_ONLY) {
            tracing::error!(
                code = ?run.code(),
                output = %run.output.trim(),
                "device enumeration failed"
            );
            return Vec::new();
        }
        let devices = parse::parse_find_devices(&run.output);
        tracing::info!(count = devices.len(), "device enumeration finished");
        devices
    }

    /// Probe the device and run a short receive smoke test.
    ///
    /// `device_args` overrides the configured args when given and non-empty.
    pub async fn connect(&mut self, device_args: Option<&str>) -> Result<DeviceSession> {
        let args = device_args
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or(&self.default_args)
            .to_string();

        self.session = DeviceSession::new(args.clone());
        self.session.connection_state = ConnectionState::Connecting;
        tracing::info!(device_args = %args, "connecting to device");

        let probe = self
            .runner
            .invoke(&self.tools.probe, &with_device_args(&args, &[]), PROBE_TIMEOUT)
            .await;
        let run = match probe {
            Ok(run) if run.accepted(SUCCESS_ONLY) => run,
            Ok(run) => {
                return Err(self.connection_failed(format!(
                    "{} exited with {:?}: {}",
                    run.program,
                    run.code(),
                    run.output.trim()
                )));
            }
            Err(e) => return Err(self.connection_failed(e.to_string())),
        };

        let info = parse::parse_probe(&run.output);
        self.session.serial = info.serial;
        self.session.product = info.product;
        self.session.fpga_version = info.fpga_version;
        self.session.firmware_version = info.firmware_version;

        let smoke = Capture {
            freq_hz: TEST_FREQ_HZ,
            gain: 20,
            duration: "1",
            limit: SMOKE_TIMEOUT,
        };
        if !self.rx_capture(&args, &smoke).await {
            return Err(self.connection_failed("receive smoke test failed".into()));
        }

        self.session.connection_state = ConnectionState::Connected;
        tracing::info!(
            serial = ?self.session.serial,
            product = ?self.session.product,
            fpga = ?self.session.fpga_version,
            "device connected"
        );
        Ok(self.session.clone())
    }

    fn connection_failed(&mut self, reason: String) -> Error {
        tracing::error!(
            device_args = %self.session.device_args,
            reason = %reason,
            "device connection failed"
        );
        self.session.connection_state = ConnectionState::Failed;
        Error::Connection(reason)
    }

    fn require_connected(&self) -> Result<&str> {
        if self.session.is_connected() {
            Ok(&self.session.device_args)
        } else {
            Err(Error::Connection(format!(
                "device not connected (state: {})",
                self.session.connection_state
            )))
        }
    }

    /// Run the full test battery. Every test runs; none aborts the rest.
    pub async fn run_tests(&self) -> Result<TestOutcome> {
        let args = self.require_connected()?;
        tracing::info!("starting device test battery");

        let mut results = Vec::with_capacity(DeviceTest::ALL.len());
        for test in DeviceTest::ALL {
            let passed = match test {
                DeviceTest::HardwareDetection => self.test_hardware_detection().await,
                DeviceTest::ClockStability => self.test_clock_stability(args).await,
                DeviceTest::TxPath => self.test_tx_path(args).await,
                DeviceTest::RxPath => {
                    let capture = Capture {
                        freq_hz: TEST_FREQ_HZ,
                        gain: 20,
                        duration: "1",
                        limit: RX_TIMEOUT,
                    };
                    self.rx_capture(args, &capture).await
                }
                DeviceTest::FrequencyAccuracy => self.test_frequency_accuracy(args).await,
                DeviceTest::GainControl => self.test_gain_control(args).await,
            };
            if passed {
                tracing::info!(test = %test, "device test passed");
            } else {
                tracing::warn!(test = %test, "device test failed");
            }
            results.push(TestResult { test, passed });
        }

        let outcome = TestOutcome::from_results(results);
        tracing::info!(
            passed = outcome.passed_count(),
            total = outcome.len(),
            "device test battery finished"
        );
        Ok(outcome)
    }

    /// DC offset, IQ imbalance, then a frequency sweep. All phases run.
    pub async fn calibrate(&self) -> Result<CalibrationReport> {
        let args = self.require_connected()?;
        tracing::info!("starting device calibration");

        let verbose = with_device_args(args, &["--verbose"]);
        let dc_offset = self
            .check(&self.tools.rx_iq_calibration, &verbose, CALIBRATION_TIMEOUT, BOUNDED)
            .await;
        log_phase("dc_offset", dc_offset);

        let iq_imbalance = self
            .check(&self.tools.tx_iq_calibration, &verbose, CALIBRATION_TIMEOUT, BOUNDED)
            .await;
        log_phase("iq_imbalance", iq_imbalance);

        let mut frequency_sweep = Vec::with_capacity(SWEEP_FREQS_HZ.len());
        for freq_hz in SWEEP_FREQS_HZ {
            let capture = Capture {
                freq_hz,
                gain: 20,
                duration: "0.5",
                limit: SWEEP_TIMEOUT,
            };
            let passed = self.rx_capture(args, &capture).await;
            if !passed {
                tracing::warn!(freq_hz, "frequency sweep point failed");
            }
            frequency_sweep.push(FrequencyCheck {
                frequency_hz: freq_hz,
                passed,
            });
        }

        let report = CalibrationReport {
            dc_offset,
            iq_imbalance,
            frequency_sweep,
        };
        log_phase("frequency_sweep", report.sweep_passed());
        tracing::info!(passed = report.passed(), "device calibration finished");
        Ok(report)
    }

    // ── Individual checks ───────────────────────────────────────────

    async fn test_hardware_detection(&self) -> bool {
        let wanted = self
            .session
            .device_type()
            .unwrap_or(DEFAULT_DEVICE_TYPE);
        self.discover().await.iter().any(|d| d.mentions(wanted))
    }

    async fn test_clock_stability(&self, args: &str) -> bool {
        let script = format!(
            "import uhd; usrp = uhd.usrp.MultiUSRP('{}'); print('{CLOCK_CHECK_PASSED}')",
            args.replace('\\', "\\\\").replace('\'', "\\'")
        );
        match self
            .runner
            .invoke(&self.tools.clock_check, &["-c".into(), script], CLOCK_TIMEOUT)
            .await
        {
            Ok(run) => run.output.contains(CLOCK_CHECK_PASSED),
            Err(e) if e.kind() == ErrorKind::SpawnError => {
                tracing::warn!(error = %e, "clock check unavailable, assuming pass");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "clock check failed to run");
                false
            }
        }
    }

    async fn test_tx_path(&self, args: &str) -> bool {
        let freq = TEST_FREQ_HZ.to_string();
        let tx_args = with_device_args(
            args,
            &[
                "--freq",
                freq.as_str(),
                "--rate",
                SAMPLE_RATE,
                "--gain",
                "10",
                "--wave-type",
                "SINE",
                "--duration",
                "1",
            ],
        );
        self.check(&self.tools.tx_waveform, &tx_args, TX_TIMEOUT, BOUNDED)
            .await
    }

    async fn test_frequency_accuracy(&self, args: &str) -> bool {
        let run = match self
            .runner
            .invoke(&self.tools.probe, &with_device_args(args, &[]), PROBE_TIMEOUT)
            .await
        {
            Ok(run) if run.accepted(SUCCESS_ONLY) => run,
            Ok(_) => return false,
            Err(e) => {
                tracing::warn!(error = %e, "probe failed");
                return false;
            }
        };
        let ranges = parse::parse_freq_ranges(&run.output);
        if ranges.is_empty() {
            return true;
        }
        let target = TEST_FREQ_HZ as f64;
        ranges.iter().any(|(lo, hi)| *lo <= target && target <= *hi)
    }

    async fn test_gain_control(&self, args: &str) -> bool {
        let mut all_passed = true;
        for gain in GAIN_STEPS {
            let capture = Capture {
                freq_hz: TEST_FREQ_HZ,
                gain,
                duration: "0.5",
                limit: GAIN_TIMEOUT,
            };
            if !self.rx_capture(args, &capture).await {
                tracing::warn!(gain, "gain step failed");
                all_passed = false;
            }
        }
        all_passed
    }

    /// Receive capture into a temporary sample file.
    async fn rx_capture(&self, args: &str, capture: &Capture) -> bool {
        let samples = match self.runner.sample_file() {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(error = %e, "cannot create sample file");
                return false;
            }
        };
        let freq = capture.freq_hz.to_string();
        let gain = capture.gain.to_string();
        let file = samples.path().to_string_lossy().into_owned();
        let rx_args = with_device_args(
            args,
            &[
                "--freq",
                freq.as_str(),
                "--rate",
                SAMPLE_RATE,
                "--gain",
                gain.as_str(),
                "--duration",
                capture.duration,
                "--file",
                file.as_str(),
            ],
        );
        self.check(&self.tools.rx_capture, &rx_args, capture.limit, BOUNDED)
            .await
    }

    async fn check(&self, program: &str, args: &[String], limit: Duration, codes: &[i32]) -> bool {
        match self.runner.invoke(program, args, limit).await {
            Ok(run) => {
                let ok = run.accepted(codes);
                if !ok {
                    tracing::debug!(
                        program,
                        code = ?run.code(),
                        output = %run.output.trim(),
                        "tool rejected"
                    );
                }
                ok
            }
            Err(e) => {
                tracing::warn!(program, error = %e, "tool failed to run");
                false
            }
        }
    }
}

fn log_phase(phase: &str, passed: bool) {
    if passed {
        tracing::info!(phase, "calibration phase passed");
    } else {
        tracing::warn!(phase, "calibration phase failed");
    }
}
