pub mod dataset;
pub mod error;
pub mod labels;
pub mod misc;
pub mod processor;
