use weave_core::DEFAULT_CONCURRENCY;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
}

/// Runner configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EtlConfig {
    /// Warehouse connection URL.
    pub database_url: String,
    /// Number of SQL files executed concurrently (default: `5`).
    pub parallel_degree: usize,
    /// Connection pool size, never below `parallel_degree + 1`.
    pub max_connections: u32,
}

impl EtlConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var               | Default                   |
    /// |-----------------------|---------------------------|
    /// | `DATABASE_URL`        | required                  |
    /// | `SQL_PARALLEL_DEGREE` | `5`                       |
    /// | `DB_MAX_CONNECTIONS`  | `SQL_PARALLEL_DEGREE + 1` |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let parallel_degree = parse_parallel_degree(lookup("SQL_PARALLEL_DEGREE").as_deref());
        let max_connections =
            parse_max_connections(lookup("DB_MAX_CONNECTIONS").as_deref(), parallel_degree);

        Ok(Self {
            database_url,
            parallel_degree,
            max_connections,
        })
    }
}

/// Positive integers are taken as-is; anything else falls back to the default.
fn parse_parallel_degree(raw: Option<&str>) -> usize {
    let Some(raw) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return DEFAULT_CONCURRENCY;
    };

    match raw.parse::<i64>() {
        Ok(n) if n > 0 => usize::try_from(n).unwrap_or(DEFAULT_CONCURRENCY),
        _ => {
            tracing::warn!(
                value = raw,
                default = DEFAULT_CONCURRENCY,
                "Invalid SQL_PARALLEL_DEGREE, using default",
            );
            DEFAULT_CONCURRENCY
        }
    }
}

fn parse_max_connections(raw: Option<&str>, parallel_degree: usize) -> u32 {
    // Every worker holds its own transaction, plus one connection left free
    // for cancelling an interrupted statement.
    let floor = u32::try_from(parallel_degree)
        .unwrap_or(u32::MAX)
        .saturating_add(1);

    let requested = match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => floor,
        Some(raw) => raw.parse::<u32>().unwrap_or_else(|_| {
            tracing::warn!(value = raw, "Invalid DB_MAX_CONNECTIONS, using minimum pool size");
            floor
        }),
    };

    requested.max(floor)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<EtlConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EtlConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_only_url_is_set() {
        let config = load(&[("DATABASE_URL", "postgres://etl@localhost/dw")]).unwrap();
        assert_eq!(config.database_url, "postgres://etl@localhost/dw");
        assert_eq!(config.parallel_degree, 5);
        assert_eq!(config.max_connections, 6);
    }

    #[test]
    fn missing_url_is_an_error() {
        assert_matches!(load(&[]), Err(ConfigError::Missing("DATABASE_URL")));
        assert_matches!(
            load(&[("DATABASE_URL", "  ")]),
            Err(ConfigError::Missing("DATABASE_URL"))
        );
    }

    #[test]
    fn positive_parallel_degree_is_used() {
        let config = load(&[("DATABASE_URL", "postgres://x"), ("SQL_PARALLEL_DEGREE", "12")])
            .unwrap();
        assert_eq!(config.parallel_degree, 12);
        assert_eq!(config.max_connections, 13);
    }

    #[test]
    fn invalid_parallel_degree_falls_back_to_default() {
        for raw in ["0", "-3", "many", "2.5", ""] {
            assert_eq!(parse_parallel_degree(Some(raw)), 5, "input {raw:?}");
        }
        assert_eq!(parse_parallel_degree(None), 5);
    }

    #[test]
    fn pool_leaves_one_connection_beyond_the_workers() {
        assert_eq!(parse_max_connections(Some("2"), 8), 9);
        assert_eq!(parse_max_connections(Some("8"), 8), 9);
        assert_eq!(parse_max_connections(Some("20"), 8), 20);
        assert_eq!(parse_max_connections(Some("lots"), 3), 4);
        assert_eq!(parse_max_connections(None, 4), 5);
    }
}
