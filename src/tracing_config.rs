//! Tracing subscriber set-up for hosts embedding the runtime.
//!
//! Output format is chosen by `KESTREL_LOG_FORMAT`:
//!
//! - `text` (default): flat `tracing-subscriber` lines
//! - `tree`: indented span tree via `tracing-tree`
//! - `json`: one JSON object per event
//!
//! ```bash
//! KESTREL_LOG=debug KESTREL_LOG_FORMAT=tree my-host
//! KESTREL_LOG="kestrel_async=trace,kestrel_rti=debug" my-host
//! ```
//!
//! Nothing is installed unless `KESTREL_LOG` or `RUST_LOG` is set.

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, fmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Tree,
    Json,
}

impl LogFormat {
    /// Unrecognised names fall back to [`LogFormat::Text`].
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "tree" => Self::Tree,
            "json" => Self::Json,
            _ => Self::Text,
        }
    }

    fn from_env() -> Self {
        Self::parse(&std::env::var("KESTREL_LOG_FORMAT").unwrap_or_default())
    }
}

/// `KESTREL_LOG` wins over `RUST_LOG` when both are set.
fn build_filter() -> EnvFilter {
    match std::env::var("KESTREL_LOG") {
        Ok(directives) => EnvFilter::builder().parse_lossy(directives),
        Err(_) => EnvFilter::from_default_env(),
    }
}

/// Install the global subscriber.
///
/// Returns `false` when logging was not requested or a subscriber is
/// already installed. Output goes to stderr.
pub fn init_tracing() -> bool {
    let requested = std::env::var_os("KESTREL_LOG").is_some() || std::env::var_os("RUST_LOG").is_some();
    if !requested {
        return false;
    }

    // Exactly one of the three output layers is `Some`.
    let format = LogFormat::from_env();
    let tree = (format == LogFormat::Tree).then(|| {
        tracing_tree::HierarchicalLayer::new(2)
            .with_writer(std::io::stderr)
            .with_targets(true)
            .with_bracketed_fields(true)
    });
    let json = (format == LogFormat::Json).then(|| fmt::layer().json().with_writer(std::io::stderr));
    let text = (format == LogFormat::Text).then(|| fmt::layer().with_writer(std::io::stderr));

    Registry::default()
        .with(build_filter())
        .with(tree)
        .with(json)
        .with(text)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_names() {
        assert_eq!(LogFormat::parse("tree"), LogFormat::Tree);
        assert_eq!(LogFormat::parse(" JSON "), LogFormat::Json);
        assert_eq!(LogFormat::parse("text"), LogFormat::Text);
        assert_eq!(LogFormat::parse(""), LogFormat::Text);
        assert_eq!(LogFormat::parse("yaml"), LogFormat::Text);
    }
}
