//! Tracing subscriber setup for the binary.
//!
//! | Env Var      | Default                                                  |
//! |--------------|----------------------------------------------------------|
//! | `RUST_LOG`   | `weave_etl=info,weave_core=info,weave_db=info,sqlx=warn` |
//! | `LOG_FORMAT` | `text` (`json` for one JSON object per line)             |

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "weave_etl=info,weave_core=info,weave_db=info,sqlx=warn";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    pub fn from_env() -> Self {
        std::env::var("LOG_FORMAT")
            .map(|v| Self::parse(&v))
            .unwrap_or_default()
    }

    fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }
}

/// Install the global subscriber. Driver (sqlx) events go through it too.
pub fn init_tracing(format: LogFormat) {
    let json = (format == LogFormat::Json).then(|| tracing_subscriber::fmt::layer().json());
    let text = (format == LogFormat::Text).then(tracing_subscriber::fmt::layer);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_FILTER.into()),
        )
        .with(json)
        .with(text)
        .init();
}
