//! Infrastructure layer

pub mod archive;
pub mod docker;
