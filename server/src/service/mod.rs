//! Service layer

pub mod copy;
pub mod exec;
