//! LTE simulator agent library.
//!
//! Generates network configurations, supervises the srsEPC and srsENB
//! processes, and drives the SDR front end through the UHD tools. The
//! `ltesim-agent` binary wires these into a CLI and a local control portal.

pub mod device;
pub mod generator;
pub mod health;
pub mod orchestrator;
pub mod portal;
pub mod render;
pub mod settings;
mod signal;
pub mod supervisor;
