//! Shared types for the LTE simulator.
//!
//! This crate contains:
//! - **Data models**: network configuration record, orchestrator status,
//!   device session and test/calibration reports
//! - **Band plan**: the fixed LTE band → EARFCN/centre frequency table
//! - **Operator names**: PLMN → display name lookup
//! - **ID derivation**: reproducible "auto" cell id / LAC helpers
//! - **Errors**: the error taxonomy shared by the orchestrator and device layer

pub mod bands;
pub mod error;
pub mod ids;
pub mod models;
pub mod operators;

pub use error::{Error, ErrorKind, Failure, Result};
