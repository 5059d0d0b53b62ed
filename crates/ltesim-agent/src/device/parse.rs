//! Parsers for UHD tool output.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use ltesim_common::models::DeviceInfo;

static SERIAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"Serial:\s*(\w+)").unwrap());
static PRODUCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"Product:\s*(.+)").unwrap());
static FPGA_VERSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"FPGA Version:\s*(.+)").unwrap());
static FIRMWARE_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Firmware Version:\s*(.+)").unwrap());
static FREQ_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Freq range:\s*(-?[\d.]+)\s*to\s*(-?[\d.]+)\s*MHz").unwrap()
});

/// Parse `uhd_find_devices` output.
///
/// Each `--` line closes the current block. `key: value` lines add fields
/// with lowercased keys; headings without a value are skipped.
pub fn parse_find_devices(output: &str) -> Vec<DeviceInfo> {
    let mut devices = Vec::new();
    let mut current = BTreeMap::new();

    for line in output.lines().map(str::trim) {
        if line.starts_with("--") {
            if !current.is_empty() {
                devices.push(DeviceInfo {
                    fields: std::mem::take(&mut current),
                });
            }
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());
        if key.is_empty() || value.is_empty() {
            continue;
        }
        current.insert(key.to_ascii_lowercase(), value.to_string());
    }
    if !current.is_empty() {
        devices.push(DeviceInfo { fields: current });
    }

    devices
}

/// Identity fields reported by `uhd_usrp_probe`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeInfo {
    pub serial: Option<String>,
    pub product: Option<String>,
    pub fpga_version: Option<String>,
    pub firmware_version: Option<String>,
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn parse_probe(output: &str) -> ProbeInfo {
    ProbeInfo {
        serial: capture(&SERIAL, output),
        product: capture(&PRODUCT, output),
        fpga_version: capture(&FPGA_VERSION, output),
        firmware_version: capture(&FIRMWARE_VERSION, output),
    }
}

/// Every `Freq range: A to B MHz` in the probe output, in Hz.
pub fn parse_freq_ranges(output: &str) -> Vec<(f64, f64)> {
    FREQ_RANGE
        .captures_iter(output)
        .filter_map(|c| {
            let lo: f64 = c.get(1)?.as_str().parse().ok()?;
            let hi: f64 = c.get(2)?.as_str().parse().ok()?;
            Some((lo * 1e6, hi * 1e6))
        })
        .collect()
}
