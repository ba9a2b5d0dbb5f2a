//! Domain models for the health records system.

mod record;

pub use record::*;
