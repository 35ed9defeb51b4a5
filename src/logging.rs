// Logging setup shared by both binaries

use env_logger::{Builder, Env, Target};
use std::fs::OpenOptions;
use std::path::Path;

use crate::config::Config;

/// Load the config at `path` and initialize logging from it. A config that
/// could not be loaded is reported once the logger is up, and defaults are used.
pub fn init_from_config_file(path: &Path, default_level: &str) -> Config {
    let (config, load_error) = Config::load_or_default(path);
    init_logging(&config, default_level);

    match load_error {
        Some(e) => log::warn!("Failed to load {}: {:#}. Using defaults.", path.display(), e),
        None => log::debug!("Config: {:?}", config),
    }

    config
}

/// Initialize `env_logger`. `RUST_LOG` overrides the configured level; with
/// `log_to_file` set, records go to the log file instead of stderr.
pub fn init_logging(config: &Config, default_level: &str) {
    let level = config.debug.log_level.as_deref().unwrap_or(default_level);

    let mut builder = Builder::from_env(Env::default().default_filter_or(level));

    if config.debug.log_to_file {
        match OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&config.debug.log_file)
        {
            Ok(file) => {
                builder.target(Target::Pipe(Box::new(file)));
            }
            Err(e) => {
                eprintln!("Cannot open log file {}: {}", config.debug.log_file, e);
            }
        }
    }

    // A second init (e.g. from tests) keeps the first logger
    let _ = builder.try_init();
}
