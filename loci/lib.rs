#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]
pub mod config;
pub mod output;
pub mod parse;
pub mod pipeline;
pub mod segment;
pub mod source;
pub mod types;

pub use config::SegmentConfig;
pub use pipeline::{
    AcrossSampleReport, LociError, WithinSampleReport, run_across_sample, run_within_sample,
};
