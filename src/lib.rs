pub mod config;
pub mod constants;
pub mod error;
pub mod extractor;
pub mod fetch;
pub mod logging;
pub mod normalize;
pub mod pipeline;
pub mod reconcile;
pub mod storage;
pub mod sweep;
pub mod types;
