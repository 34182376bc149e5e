//! Block propagation timeline reconstruction from block profiler logs.
//!
//! Events flow one way: [`ingest`] → [`lifecycle`] (group, resolve,
//! validate) → [`metrics`] → [`aggregate`] → [`report`].

pub mod aggregate;
pub mod analyzer;
pub mod args;
pub mod config;
pub mod error;
pub mod ingest;
pub mod io_utils;
pub mod lifecycle;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod stats;
