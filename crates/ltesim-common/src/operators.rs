//! PLMN → operator display names.
//!
//! Names are broadcast by the simulated network (full and short form), so a
//! phone camping on it shows something familiar for the configured PLMN.

/// Known operators: `(plmn_id, full name, short name)`.
const OPERATORS: &[(&str, &str, &str)] = &[
    ("45601", "Cellcard", "Cellcard"),
    ("45602", "Smart Mobile", "Smart"),
    ("45603", "qb", "qb"),
    ("45604", "qb", "qb"),
    ("45605", "Smart Mobile", "Smart"),
    ("45606", "Smart Axiata", "Smart"),
    ("45608", "Metfone", "Metfone"),
    ("45609", "Metfone", "Metfone"),
];

/// Full and short display name for a PLMN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorName {
    pub full: String,
    pub short: String,
}

/// Look up the display names for `plmn_id`.
///
/// Unknown PLMNs get synthesized names: `Operator <plmn>` / `Op<plmn>`.
pub fn operator_name(plmn_id: &str) -> OperatorName {
    match OPERATORS.iter().find(|(plmn, _, _)| *plmn == plmn_id) {
        Some((_, full, short)) => OperatorName {
            full: (*full).to_string(),
            short: (*short).to_string(),
        },
        None => OperatorName {
            full: format!("Operator {plmn_id}"),
            short: format!("Op{plmn_id}"),
        },
    }
}
