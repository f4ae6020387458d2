//! Logging helpers
//!
//! Logger initialization and formatting of raw frame bytes for log output.

/// Initialize the global logger
///
/// `RUST_LOG` takes precedence; `level` is used when it is unset.
///
/// # Parameters
///
/// * `level` - Log level
pub fn init_logger(level: &str) {
    let env = env_logger::Env::default()
        .filter_or("RUST_LOG", level);

    // A second initialization (tests, embedding) is not an error for us
    let _ = env_logger::Builder::from_env(env).try_init();
}

/// Render bytes as printable ASCII with escapes, e.g. `PING\n`
pub fn escape_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .flat_map(|b| std::ascii::escape_default(*b))
        .map(char::from)
        .collect()
}
