//! signwatch library
//!
//! Road-sign map viewer core: sign catalog, live location display and
//! proximity alerting. Exposes modules for integration testing and binary reuse.

pub mod domain;
pub mod infra;
pub mod io;
pub mod services;
