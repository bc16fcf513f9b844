//! The collector capability and helpers shared by its implementations.

use std::collections::HashSet;
use std::hash::Hash;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::CollectorError;
use crate::types::{CollectorConfig, CollectorResult};

const MAX_SLUG_LEN: usize = 50;

static NON_SLUG_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("valid slug regex"));

/// A worker that queries one external data source.
///
/// Implementations must:
/// - check `cancel` before starting each query and return
///   [`CollectorError::Cancelled`] once it has fired,
/// - call their rate limiter's `wait` before every outbound request,
/// - record per-query failures in [`CollectorResult::errors`] and move on,
/// - deduplicate their own output by a natural key,
/// - write artifacts only from fully accumulated results.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Stable identifier used for registry lookup and status keys.
    fn name(&self) -> &str;

    async fn hunt(
        &self,
        cancel: &CancellationToken,
        config: CollectorConfig,
    ) -> Result<CollectorResult, CollectorError>;
}

/// Returns [`CollectorError::Cancelled`] once `cancel` has fired.
///
/// # Errors
///
/// Returns [`CollectorError::Cancelled`] if the token is cancelled.
pub fn ensure_not_cancelled(cancel: &CancellationToken) -> Result<(), CollectorError> {
    if cancel.is_cancelled() {
        Err(CollectorError::Cancelled)
    } else {
        Ok(())
    }
}

/// Drops items whose key is already in `seen`, recording the rest.
///
/// `seen` outlives a single batch so duplicates are caught across queries.
pub fn retain_unseen<T, K, F>(items: &mut Vec<T>, seen: &mut HashSet<K>, key: F)
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    items.retain(|item| seen.insert(key(item)));
}

/// Lowercase, hyphen-separated form of `s` for use in file names.
#[must_use]
pub fn slugify(s: &str) -> String {
    let lower = s.to_lowercase();
    let slug = NON_SLUG_CHARS.replace_all(&lower, "-");
    let slug = slug.trim_matches('-');
    if slug.len() <= MAX_SLUG_LEN {
        return slug.to_string();
    }
    // The slug is pure ASCII so any byte index is a char boundary.
    slug[..MAX_SLUG_LEN].trim_end_matches('-').to_string()
}

/// Serialize `value` as YAML and write it to `dir/file_name`.
///
/// The document is written to a sibling temp file and renamed into place,
/// so readers never see a partial artifact. The temp file is removed if
/// either step fails.
///
/// # Errors
///
/// Returns [`CollectorError::Serialize`] if `value` cannot be encoded, or
/// [`CollectorError::Io`] if the directory or file cannot be written.
pub async fn write_yaml_artifact<T: Serialize>(
    dir: &Path,
    file_name: &str,
    value: &T,
) -> Result<PathBuf, CollectorError> {
    let yaml = serde_yaml::to_string(value)?;

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| CollectorError::Io {
            path: dir.display().to_string(),
            source,
        })?;

    let path = dir.join(file_name);
    let tmp = dir.join(format!("{file_name}.tmp"));
    if let Err(source) = tokio::fs::write(&tmp, yaml).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(CollectorError::Io {
            path: tmp.display().to_string(),
            source,
        });
    }
    if let Err(source) = tokio::fs::rename(&tmp, &path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(CollectorError::Io {
            path: path.display().to_string(),
            source,
        });
    }

    Ok(path)
}
