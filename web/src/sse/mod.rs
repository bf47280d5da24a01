//! HTTP entry point for the push stream. Connection bookkeeping lives in the
//! `sse` crate.

pub(crate) mod handler;
