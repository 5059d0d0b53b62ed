//! Device controller tests with stub UHD tools.

mod common;

use std::path::{Path, PathBuf};
use std::time::Duration;

use ltesim_agent::device::DeviceController;
use ltesim_agent::device::tools::{TIMEOUT_EXIT_CODE, ToolRunner};
use ltesim_agent::settings::Settings;
use ltesim_common::ErrorKind;
use ltesim_common::models::{ConnectionState, DeviceTest};

use common::{stub, test_settings};

const FIND_OUTPUT: &str = "\
--------------------------------------------------
-- UHD Device 0
--------------------------------------------------
Device Address:
    serial: 30AD2C5
    name: MyB210
    product: B210
    type: b200";

const PROBE_OUTPUT: &str = "\
  |  |   Mboard: B210
  |  |   Product: B210
  |  |   Serial: 30AD2C5
  |  |   FPGA Version: 16.0
  |  |   Firmware Version: 8.0
  |  |  |   Freq range: 70.000 to 6000.000 MHz";

/// Writes a byte to the `--file` argument, if any.
const RX_CAPTURE: &str = "\
while [ $# -gt 0 ]; do
  if [ \"$1\" = --file ]; then echo samples > \"$2\"; fi
  shift
done
exit 0";

struct Bench {
    _dir: tempfile::TempDir,
    bin: PathBuf,
    settings: Settings,
}

impl Bench {
    /// Every tool present and succeeding.
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        let mut settings = test_settings(dir.path(), Path::new("srsepc"), Path::new("srsenb"));
        let tools = &mut settings.device.tools;
        tools.find_devices = tool(
            &bin,
            "uhd_find_devices",
            &format!("cat <<'EOF'\n{FIND_OUTPUT}\nEOF"),
        );
        tools.probe = tool(
            &bin,
            "uhd_usrp_probe",
            &format!("cat <<'EOF'\n{PROBE_OUTPUT}\nEOF"),
        );
        tools.rx_capture = tool(&bin, "rx_samples_to_file", RX_CAPTURE);
        tools.tx_waveform = tool(&bin, "tx_waveforms", "exit 0");
        tools.rx_iq_calibration = tool(&bin, "uhd_cal_rx_iq_balance", "exit 0");
        tools.tx_iq_calibration = tool(&bin, "uhd_cal_tx_iq_balance", "exit 0");
        tools.clock_check = tool(&bin, "python3", "echo 'Clock test passed'");
        Self {
            _dir: dir,
            bin,
            settings,
        }
    }

    fn replace(&mut self, name: &str, body: &str) -> String {
        tool(&self.bin, name, body)
    }

    fn scratch_is_empty(&self) -> bool {
        std::fs::read_dir(&self.settings.device.scratch_dir)
            .unwrap()
            .next()
            .is_none()
    }

    fn controller(&self) -> DeviceController {
        DeviceController::new(&self.settings.device)
    }
}

fn tool(bin: &Path, name: &str, body: &str) -> String {
    stub(bin, name, body).display().to_string()
}

#[tokio::test]
async fn discover_lists_devices() {
    let bench = Bench::new();
    let devices = bench.controller().discover().await;
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].serial(), Some("30AD2C5"));
    assert_eq!(devices[0].device_type(), Some("b200"));
}

#[tokio::test]
async fn discover_failure_is_empty() {
    let mut bench = Bench::new();
    bench.settings.device.tools.find_devices = bench.replace("uhd_find_devices", "exit 1");
    assert!(bench.controller().discover().await.is_empty());

    bench.settings.device.tools.find_devices = "/nonexistent/uhd_find_devices".into();
    assert!(bench.controller().discover().await.is_empty());
}

#[tokio::test]
async fn connect_fills_session() {
    let bench = Bench::new();
    let mut controller = bench.controller();
    let session = controller.connect(None).await.unwrap();

    assert_eq!(session.connection_state, ConnectionState::Connected);
    assert_eq!(session.device_args, bench.settings.device.device_args);
    assert_eq!(session.serial.as_deref(), Some("30AD2C5"));
    assert_eq!(session.product.as_deref(), Some("B210"));
    assert_eq!(session.fpga_version.as_deref(), Some("16.0"));
    assert_eq!(session.firmware_version.as_deref(), Some("8.0"));
    assert_eq!(controller.session(), &session);
    assert!(bench.scratch_is_empty());
}

#[tokio::test]
async fn connect_uses_given_device_args() {
    let bench = Bench::new();
    let mut controller = bench.controller();
    let session = controller.connect(Some("type=b200,serial=30AD2C5")).await.unwrap();
    assert_eq!(session.device_args, "type=b200,serial=30AD2C5");
}

#[tokio::test]
async fn failed_probe_fails_connection() {
    let mut bench = Bench::new();
    bench.settings.device.tools.probe =
        bench.replace("uhd_usrp_probe", "echo 'No devices found' >&2\nexit 1");
    let mut controller = bench.controller();

    let err = controller.connect(None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConnectionError);
    assert_eq!(controller.session().connection_state, ConnectionState::Failed);
}

#[tokio::test]
async fn failed_smoke_test_fails_connection() {
    let mut bench = Bench::new();
    bench.settings.device.tools.rx_capture = bench.replace("rx_samples_to_file", "exit 2");
    let mut controller = bench.controller();

    let err = controller.connect(None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConnectionError);
    assert_eq!(controller.session().connection_state, ConnectionState::Failed);
}

#[tokio::test]
async fn tests_require_connection() {
    let bench = Bench::new();
    let controller = bench.controller();
    assert_eq!(
        controller.run_tests().await.unwrap_err().kind(),
        ErrorKind::ConnectionError
    );
    assert_eq!(
        controller.calibrate().await.unwrap_err().kind(),
        ErrorKind::ConnectionError
    );
}

#[tokio::test]
async fn test_battery_reports_all_six_in_order() {
    let bench = Bench::new();
    let mut controller = bench.controller();
    controller.connect(None).await.unwrap();

    let outcome = controller.run_tests().await.unwrap();
    let order: Vec<DeviceTest> = outcome.results.iter().map(|r| r.test).collect();
    assert_eq!(order, DeviceTest::ALL.to_vec());
    assert!(outcome.all_passed(), "{outcome:?}");
    assert!(bench.scratch_is_empty());
}

#[tokio::test]
async fn failing_test_does_not_abort_battery() {
    let mut bench = Bench::new();
    bench.settings.device.tools.tx_waveform = bench.replace("tx_waveforms", "exit 1");
    let mut controller = bench.controller();
    controller.connect(None).await.unwrap();

    let outcome = controller.run_tests().await.unwrap();
    assert_eq!(outcome.len(), 6);
    assert_eq!(outcome.get(DeviceTest::TxPath), Some(false));
    assert_eq!(outcome.get(DeviceTest::RxPath), Some(true));
    assert_eq!(outcome.get(DeviceTest::GainControl), Some(true));
    assert_eq!(outcome.passed_count(), 5);
}

#[tokio::test]
async fn missing_clock_interpreter_counts_as_pass() {
    let mut bench = Bench::new();
    bench.settings.device.tools.clock_check = "/nonexistent/python3".into();
    let mut controller = bench.controller();
    controller.connect(None).await.unwrap();

    let outcome = controller.run_tests().await.unwrap();
    assert_eq!(outcome.get(DeviceTest::ClockStability), Some(true));
}

#[tokio::test]
async fn hardware_detection_needs_matching_type() {
    let bench = Bench::new();
    let mut controller = bench.controller();
    controller.connect(Some("type=x300,addr=192.168.10.2")).await.unwrap();

    let outcome = controller.run_tests().await.unwrap();
    assert_eq!(outcome.get(DeviceTest::HardwareDetection), Some(false));
    assert_eq!(outcome.len(), 6);
}

#[tokio::test]
async fn out_of_range_frequency_fails_accuracy() {
    let mut bench = Bench::new();
    bench.settings.device.tools.probe = bench.replace(
        "uhd_usrp_probe",
        "echo '  |   Freq range: 2400.000 to 2500.000 MHz'",
    );
    let mut narrow = bench.controller();
    narrow.connect(None).await.unwrap();
    let outcome = narrow.run_tests().await.unwrap();
    assert_eq!(outcome.get(DeviceTest::FrequencyAccuracy), Some(false));
}

#[tokio::test]
async fn calibration_runs_every_phase() {
    let mut bench = Bench::new();
    bench.settings.device.tools.rx_iq_calibration =
        bench.replace("uhd_cal_rx_iq_balance", "exit 1");
    let mut controller = bench.controller();
    controller.connect(None).await.unwrap();

    let report = controller.calibrate().await.unwrap();
    assert!(!report.dc_offset);
    assert!(report.iq_imbalance);
    let freqs: Vec<u64> = report.frequency_sweep.iter().map(|c| c.frequency_hz).collect();
    assert_eq!(freqs, vec![900_000_000, 1_800_000_000, 2_100_000_000]);
    assert!(report.sweep_passed());
    assert!(!report.passed());
    assert!(bench.scratch_is_empty());
}

#[tokio::test]
async fn timed_out_tool_is_killed_and_cleaned_up() {
    let bench = Bench::new();
    let sleeper = tool(&bench.bin, "hangs", "sleep 30");
    let runner = ToolRunner::new(&bench.settings.device.scratch_dir);

    let samples = runner.sample_file().unwrap();
    let samples_path = samples.path().to_path_buf();
    let run = runner
        .invoke(&sleeper, &[], Duration::from_millis(200))
        .await
        .unwrap();
    drop(samples);

    assert!(run.timed_out);
    assert_eq!(run.code(), Some(TIMEOUT_EXIT_CODE));
    assert!(!samples_path.exists());
    assert!(bench.scratch_is_empty());
}
