pub mod encoder;
pub mod metrics;
pub mod model;
pub mod split;
pub mod trainer;
