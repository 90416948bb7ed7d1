//! Command implementations for the prodlens CLI

mod detect;
mod rate;

pub use detect::*;
pub use rate::*;
