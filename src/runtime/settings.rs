use std::path::PathBuf;

use crate::config;

/// Load settings from `explicit` (the `--config` flag) or the resolved
/// default path. Logging is not up yet, so problems go to stderr and the
/// defaults are used.
pub fn load_settings(explicit: Option<PathBuf>) -> config::Settings {
    let path = explicit.or_else(config::resolve_config_path);
    match config::Settings::load_from(path) {
        Ok(s) => {
            if let Err(msg) = s.validate() {
                eprintln!("allegro: invalid config, using defaults: {msg}");
                config::Settings::default()
            } else {
                s
            }
        }
        Err(e) => {
            // Config is optional; failures should not prevent the app from starting.
            eprintln!("allegro: failed to load config, using defaults: {e}");
            config::Settings::default()
        }
    }
}
