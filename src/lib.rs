// Specific pedantic lints enforced (not blanket allow):
#![deny(
    clippy::explicit_iter_loop,
    clippy::manual_let_else,
    clippy::semicolon_if_nothing_returned,
    clippy::inconsistent_struct_constructor
)]
#![allow(
    clippy::cast_possible_truncation, // Byte counts and durations stay well within range
    clippy::cast_precision_loss,      // u64::MAX comparison in the decoder
    clippy::cast_sign_loss,           // Only after a non-negative check
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,  // e.g. CollectorError in collector module
    clippy::must_use_candidate
)]

pub mod app;
pub mod collector;
pub mod domain;
pub mod parser;
pub mod sender;

pub use app::{App, Config, RunConfig};
pub use domain::{Metric, ServiceMetricsError};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
