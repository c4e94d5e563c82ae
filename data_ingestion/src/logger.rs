use env_logger::{Builder, Env};

/// Installs the global logger. `RUST_LOG` overrides the default `info` filter.
/// Calling it twice is harmless; the second call is ignored.
pub fn init_logger() {
    let _ = Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}
