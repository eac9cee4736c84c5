//! CLI library components for the metafix postprocessor.

pub mod logging;
