//! Reproducible "auto" identifiers.
//!
//! When the user leaves the cell id or LAC as `auto`, a value is derived from
//! the PLMN so the same `(mcc, mnc)` always yields the same network. The hash
//! is 32-bit FNV-1a: it is not cryptographic and only exists to spread
//! neighbouring PLMNs apart so generated networks look plausible.

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Salt mixed into the LAC derivation so it is independent of the cell id.
pub const LAC_SALT: &str = "lac";

fn fnv1a(parts: &[&str]) -> u32 {
    parts
        .iter()
        .flat_map(|part| part.bytes())
        .fold(FNV_OFFSET_BASIS, |hash, byte| {
            (hash ^ u32::from(byte)).wrapping_mul(FNV_PRIME)
        })
}

/// Derive a value in `floor..floor + range` from the seed fields and salt.
///
/// Pure and stable across runs and platforms. `range` of zero yields `floor`.
pub fn derive_auto_id(seed_fields: &[&str], salt: &str, floor: u32, range: u32) -> u32 {
    if range == 0 {
        return floor;
    }
    let mut parts: Vec<&str> = seed_fields.to_vec();
    parts.push(salt);
    floor + fnv1a(&parts) % range
}

/// Canonical text form of the PLMN parts used as hash seed.
fn seed(mcc: u16, mnc: u16) -> (String, String) {
    (format!("{mcc:03}"), format!("{mnc:02}"))
}

/// Auto cell id: `mcc*1000 + mnc*100` plus a derived offset in `100..1000`.
pub fn auto_cell_id(mcc: u16, mnc: u16) -> u32 {
    let (mcc_s, mnc_s) = seed(mcc, mnc);
    let base = u32::from(mcc) * 1000 + u32::from(mnc) * 100;
    base + derive_auto_id(&[&mcc_s, &mnc_s], "", 100, 900)
}

/// Auto LAC: `mcc*10 + mnc` plus a derived offset in `1000..1500`.
pub fn auto_lac(mcc: u16, mnc: u16) -> u32 {
    let (mcc_s, mnc_s) = seed(mcc, mnc);
    let base = u32::from(mcc) * 10 + u32::from(mnc);
    base + derive_auto_id(&[&mcc_s, &mnc_s], LAC_SALT, 1000, 500)
}
