//! Visit report checker library
//!
//! Exposes modules for integration testing and the `visit-check` binary.

pub mod domain;
pub mod error;
pub mod infra;
pub mod io;
pub mod services;
