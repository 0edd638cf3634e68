//! Configuration constants

pub mod defaults;
pub mod urls;
