pub mod engine;
pub mod misc;
pub mod server;
