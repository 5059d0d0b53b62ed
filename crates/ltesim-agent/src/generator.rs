//! Network configuration generator.
//!
//! Turns form-style [`NetworkParams`] into a complete [`NetworkConfig`].
//! Pure apart from the `generated_at` timestamp: the same parameters always
//! produce the same identifiers and frequency plan.

use chrono::Utc;

use ltesim_common::models::{
    AUTO, FrequencyPlan, InterfaceAddrs, NasTimers, NetworkConfig, NetworkParams, RadioParams,
    SecurityParams, plmn_id,
};
use ltesim_common::{Error, Result, bands, ids, operators};

/// Parse an MCC/MNC: 1-3 ASCII digits.
fn parse_plmn_part(name: &'static str, value: &str) -> Result<u16> {
    let value = value.trim();
    if value.is_empty() || value.len() > 3 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::invalid(
            name,
            format!("expected 1-3 digits, got {value:?}"),
        ));
    }
    value
        .parse()
        .map_err(|e| Error::invalid(name, format!("{value:?}: {e}")))
}

fn is_auto(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value.eq_ignore_ascii_case(AUTO)
}

/// Explicit id, or `derive()` when the field is `auto`/empty.
fn resolve_id(name: &'static str, value: &str, derive: impl FnOnce() -> u32) -> Result<u32> {
    if is_auto(value) {
        return Ok(derive());
    }
    let value = value.trim();
    value
        .parse()
        .map_err(|_| Error::invalid(name, format!("expected a number or \"auto\", got {value:?}")))
}

/// Build a [`NetworkConfig`] from user parameters.
///
/// Fails only with [`Error::InvalidParameter`].
pub fn generate(params: &NetworkParams) -> Result<NetworkConfig> {
    let mcc = parse_plmn_part("mcc", &params.mcc)?;
    let mnc = parse_plmn_part("mnc", &params.mnc)?;
    let plmn = plmn_id(mcc, mnc);

    let cell_id = resolve_id("cell_id", &params.cell_id, || ids::auto_cell_id(mcc, mnc))?;
    let lac = resolve_id("lac", &params.lac, || ids::auto_lac(mcc, mnc))?;

    let lookup = bands::lookup(&params.band);
    if lookup.is_fallback() {
        tracing::warn!(
            requested = %params.band,
            fallback = bands::DEFAULT_BAND,
            "unknown LTE band, using default band plan"
        );
    }
    let plan = lookup.plan();

    let name = operators::operator_name(&plmn);

    let config = NetworkConfig {
        mcc,
        mnc,
        plmn_id: plmn,
        cell_id,
        lac,
        tac: lac,
        requested_band: params.band.trim().to_string(),
        band_fallback: lookup.is_fallback(),
        frequency: FrequencyPlan {
            band: plan.band,
            dl_earfcn: plan.dl_earfcn,
            ul_earfcn: plan.ul_earfcn,
            center_freq_hz: plan.center_freq_hz,
        },
        radio: RadioParams::default(),
        network_name: name.full,
        short_network_name: name.short,
        security: SecurityParams::default(),
        timers: NasTimers::default(),
        interfaces: InterfaceAddrs::default(),
        generated_at: Utc::now(),
    };

    tracing::info!(
        network = %config.network_name,
        plmn = %config.plmn_id,
        cell_id = config.cell_id,
        lac = config.lac,
        band = config.frequency.band,
        "generated network configuration"
    );

    Ok(config)
}
