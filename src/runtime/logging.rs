use tracing_subscriber::EnvFilter;

use crate::config::LogSettings;

/// Install the global `tracing` subscriber, writing to stderr so log lines
/// do not interleave with command output. Returns whether it was installed.
pub fn init(settings: &LogSettings) -> bool {
    let filter = env_filter(std::env::var("RUST_LOG").ok(), &settings.filter);
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
    if let Err(e) = &installed {
        eprintln!("allegro: logging not initialised: {e}");
    }
    installed.is_ok()
}

/// `RUST_LOG` wins over the configured directive; anything unparsable
/// degrades to `warn`.
fn env_filter(rust_log: Option<String>, configured: &str) -> EnvFilter {
    rust_log
        .and_then(|directive| EnvFilter::try_new(directive).ok())
        .or_else(|| EnvFilter::try_new(configured).ok())
        .unwrap_or_else(|| EnvFilter::new("warn"))
}
