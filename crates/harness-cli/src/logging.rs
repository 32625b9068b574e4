//! Log subscriber setup

use tracing_subscriber::EnvFilter;

/// Install the stderr subscriber
///
/// `RUST_LOG` wins when set; otherwise `level` from the resolved settings.
/// Calling this twice is harmless.
pub fn init(level: &str, ansi: bool) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(level))
        .with_writer(std::io::stderr)
        .with_ansi(ansi)
        .with_target(false)
        .try_init();
}

fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        init("warn", false);
        init("debug", false);
    }

    #[test]
    fn test_filter_accepts_configured_level() {
        let rendered = EnvFilter::new("debug").to_string();
        assert_eq!(rendered, "debug");
        let _ = filter("info");
    }
}
