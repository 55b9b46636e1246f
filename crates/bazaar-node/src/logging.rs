use crate::config::LoggingConfig;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Initialize the logging system. `RUST_LOG` wins over the config file;
/// `-v` flags win over both.
pub fn init_logging(config: &LoggingConfig, cli_verbose: u8) -> anyhow::Result<()> {
    let log_level = match cli_verbose {
        0 => config.level.as_str(),
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("bazaar={}", log_level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to set subscriber: {}", e))?;
    Ok(())
}

/// Print a timestamped testbed log entry to standard output.
///
/// These lines are what integration harnesses grep for, independent of the
/// tracing output: `TB <timestamp> <EVENT>`.
pub fn test_log(event: &str) {
    println!("TB {} {}", chrono::Utc::now().to_rfc3339(), event);
}
