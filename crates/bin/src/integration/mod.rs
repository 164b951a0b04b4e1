//! Wiring between the command line, the Yahoo Finance data layer and the
//! portfolio engine.

pub(crate) mod cache_manager;
pub(crate) mod data_pipeline;
pub(crate) mod logging;
