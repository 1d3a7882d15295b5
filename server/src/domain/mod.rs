//! Domain layer

pub mod copy;
pub mod types;
