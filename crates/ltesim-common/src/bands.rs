//! # LTE Band Plan
//!
//! Fixed table of the bands the simulator can bring up, with the
//! downlink/uplink EARFCN pair and the downlink centre frequency for each.
//!
//! | Band | Name     | DL EARFCN | UL EARFCN | Centre (Hz)   |
//! |------|----------|-----------|-----------|---------------|
//! | 1    | 2100 MHz | 300       | 18300     | 2 140 000 000 |
//! | 3    | 1800 MHz | 1200      | 19200     | 1 842 500 000 |
//! | 8    | 900 MHz  | 3450      | 21450     | 942 500 000   |
//! | 20   | 800 MHz  | 6150      | 24150     | 791 000 000   |
//!
//! Unknown bands resolve to band 3, reported as [`BandLookup::Fallback`].

use std::fmt;

/// One entry of the band table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandPlan {
    /// 3GPP E-UTRA band number.
    pub band: u16,
    /// Marketing name of the band.
    pub name: &'static str,
    pub dl_earfcn: u32,
    pub ul_earfcn: u32,
    /// Downlink centre frequency in Hz.
    pub center_freq_hz: u64,
}

impl fmt::Display for BandPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{} ({})", self.band, self.name)
    }
}

/// Band used when the requested band is not in [`BANDS`].
pub const DEFAULT_BAND: u16 = 3;

pub const BANDS: &[BandPlan] = &[
    BandPlan {
        band: 1,
        name: "2100MHz",
        dl_earfcn: 300,
        ul_earfcn: 18300,
        center_freq_hz: 2_140_000_000,
    },
    BandPlan {
        band: 3,
        name: "1800MHz",
        dl_earfcn: 1200,
        ul_earfcn: 19200,
        center_freq_hz: 1_842_500_000,
    },
    BandPlan {
        band: 8,
        name: "900MHz",
        dl_earfcn: 3450,
        ul_earfcn: 21450,
        center_freq_hz: 942_500_000,
    },
    BandPlan {
        band: 20,
        name: "800MHz",
        dl_earfcn: 6150,
        ul_earfcn: 24150,
        center_freq_hz: 791_000_000,
    },
];

/// Result of resolving a user-supplied band string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandLookup {
    /// The band is in the table.
    Exact(&'static BandPlan),
    /// The band is unknown; the [`DEFAULT_BAND`] entry was substituted.
    Fallback(&'static BandPlan),
}

impl BandLookup {
    pub fn plan(&self) -> &'static BandPlan {
        match self {
            BandLookup::Exact(plan) | BandLookup::Fallback(plan) => plan,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, BandLookup::Fallback(_))
    }
}

/// Find a band by number.
pub fn find(band: u16) -> Option<&'static BandPlan> {
    BANDS.iter().find(|plan| plan.band == band)
}

/// The [`DEFAULT_BAND`] entry.
pub fn default_plan() -> &'static BandPlan {
    // The default band is a literal entry of BANDS.
    BANDS
        .iter()
        .find(|plan| plan.band == DEFAULT_BAND)
        .unwrap_or(&BANDS[1])
}

/// Resolve a band string such as `"3"` or `" 20 "`.
///
/// Anything that does not name a band in [`BANDS`] (including non-numeric
/// input) resolves to [`BandLookup::Fallback`] carrying band 3.
pub fn lookup(band: &str) -> BandLookup {
    match band.trim().parse::<u16>().ok().and_then(find) {
        Some(plan) => BandLookup::Exact(plan),
        None => BandLookup::Fallback(default_plan()),
    }
}
