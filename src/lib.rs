//! prodlens - find the product on a web page and merge its ratings across retailers
//!
//! The two halves are independent: [`cascade`] turns markup into a
//! [`facts::DetectedProduct`], and [`rating`] turns per-platform observations
//! into an [`rating::AggregatedScore`]. [`probe::Analyzer`] wires them together.

pub mod batch;
pub mod cascade;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod facts;
pub mod fetch;
pub mod markup;
pub mod normalize;
pub mod platform;
pub mod probe;
pub mod rating;

pub use batch::run_batched;
pub use cascade::extract;
pub use error::{ProdlensError, Result};
pub use platform::identify_platform;
pub use rating::aggregate;
