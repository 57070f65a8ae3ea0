//! SQL script discovery.
//!
//! A [`Script`] is one `.sql` file read into memory. Scripts are opaque to
//! the rest of the crate: nothing parses or splits their text.

use std::cmp::Ordering;
use std::fs;
use std::path::Path;

use crate::error::EtlError;

/// File extension (compared case-insensitively) selected by [`load_scripts`].
pub const SQL_EXTENSION: &str = "sql";

/// One unit of work, executed in its own transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    /// File name, used for logging and error attribution only.
    pub name: String,
    /// Raw statement text.
    pub text: String,
}

impl Script {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }
}

/// Load every `*.sql` file directly inside `dir`.
///
/// Subdirectories and other file types are skipped. Results are ordered by
/// file name, case-insensitively with a byte-wise tie-break. Any listing or
/// read failure aborts the whole load and no script is returned. A file whose
/// contents are not valid UTF-8 counts as a read failure
/// ([`std::io::ErrorKind::InvalidData`]).
pub fn load_scripts(dir: impl AsRef<Path>) -> Result<Vec<Script>, EtlError> {
    let dir = dir.as_ref();
    let discovery = |source| EtlError::Discovery {
        path: dir.to_path_buf(),
        source,
    };

    let mut scripts = Vec::new();
    for entry in fs::read_dir(dir).map_err(discovery)? {
        let entry = entry.map_err(discovery)?;
        let path = entry.path();
        let file_name = entry.file_name().to_string_lossy().into_owned();

        if !is_sql_file(&path) {
            tracing::debug!(entry = %file_name, "Skip non-sql file");
            continue;
        }
        if fs::metadata(&path).map_err(discovery)?.is_dir() {
            tracing::debug!(entry = %file_name, "Skip directory");
            continue;
        }

        let text = fs::read_to_string(&path).map_err(|source| EtlError::Discovery {
            path: path.clone(),
            source,
        })?;
        scripts.push(Script::new(file_name, text));
    }

    scripts.sort_by(|a, b| compare_names(&a.name, &b.name));
    tracing::debug!(dir = %dir.display(), count = scripts.len(), "Loaded SQL files");
    Ok(scripts)
}

fn is_sql_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(SQL_EXTENSION))
}

fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}
