use anyhow::Context;
use serde::Serialize;
use std::time::Duration;

use clipvault_core::PackagingSettings;

/// Initialize tracing for the CLI. Logs go to stderr so stdout stays machine-readable.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

pub fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

/// Per-process transcoder deadline; `None` waits indefinitely.
pub fn transcode_timeout(settings: &PackagingSettings) -> Option<Duration> {
    settings
        .transcode_timeout_secs
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipvault_core::Config;

    #[test]
    fn transcode_timeout_unset_by_default() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(transcode_timeout(&config.packaging), None);
    }

    #[test]
    fn transcode_timeout_zero_means_none() {
        let config = Config::from_lookup(|name| {
            (name == "TRANSCODE_TIMEOUT_SECS").then(|| "0".to_string())
        })
        .unwrap();
        assert_eq!(transcode_timeout(&config.packaging), None);

        let config = Config::from_lookup(|name| {
            (name == "TRANSCODE_TIMEOUT_SECS").then(|| "900".to_string())
        })
        .unwrap();
        assert_eq!(
            transcode_timeout(&config.packaging),
            Some(Duration::from_secs(900))
        );
    }
}
