//! The protocol server of the `vigil` binary.

pub(crate) mod engine;
pub(crate) mod serve;
