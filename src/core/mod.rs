//! Core constants and error types shared by every layer.
//!
//! This module has no I/O and no optional dependencies; the codec, the
//! dispatch router and the subsystem encoders build on it directly.

mod constants;
mod error;

pub use constants::*;
pub use error::*;
