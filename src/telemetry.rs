use crate::config::LogFormat;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_directives` is used, e.g.
/// `"dividend_ml=info,sqlx=warn"`.
pub fn init_tracing(default_directives: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    // try_init: a second call (tests, embedded use) must not panic
    let _ = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.try_init(),
    };
}

/// Default filter directives for one of the crate's binaries
pub fn default_directives(log_level: &str) -> String {
    format!(
        "dividend_ml={lvl},fetch_data={lvl},train_model={lvl},dividend_ui={lvl},sqlx=warn,tower_http=info",
        lvl = log_level
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_include_level() {
        let directives = default_directives("debug");
        assert!(directives.starts_with("dividend_ml=debug"));
        assert!(directives.contains("sqlx=warn"));
    }
}
