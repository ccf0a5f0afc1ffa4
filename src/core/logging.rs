//! Logging initialization

/// Initialize the logging system
///
/// Uses env_logger with default filter level of `info`.
/// Override with RUST_LOG environment variable, e.g.
/// `RUST_LOG=tiletrav=debug` to see subtree loads.
///
/// # Example
/// ```
/// tiletrav::core::logging::init();
/// log::info!("Traversal started");
/// ```
pub fn init() {
    // A host may already have installed a logger
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    ).try_init();
}
