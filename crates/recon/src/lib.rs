//! `coverscan-recon`: reconciles catalog ISBN/ISSN data against barcodes
//! decoded from scanned volumes.
//!
//! Pure engine crate: receives pre-loaded text, returns classified results
//! and rendered reports. No CLI or filesystem dependencies.

pub mod aggregate;
pub mod classify;
pub mod config;
pub mod duplicates;
pub mod engine;
pub mod equivalence;
pub mod error;
pub mod evidence;
pub mod identifier;
pub mod model;
pub mod report;
pub mod source;
pub mod summarize;
pub mod validate;

pub use config::ReconConfig;
pub use engine::{load_input, run, run_with, RunOptions};
pub use error::ReconError;
pub use identifier::{IdKind, Identifier};
pub use model::{ReconBucket, ReconInput, ReconResult};
