//! Utility functions for titles, headers and destination paths

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

/// Characters that may not appear in a directory name on common filesystems
#[allow(clippy::expect_used)]
static FORBIDDEN_TITLE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[\\/:*?"<>|#\r\n]"#).expect("static regex is valid"));

/// Turn a page title into a directory name
///
/// Strips `\ / : * ? " < > | #` and line breaks, then trims surrounding whitespace.
///
/// # Examples
///
/// ```
/// use comic_dl::utils::sanitize_title;
///
/// assert_eq!(sanitize_title("  Part 1: The <Start>?\n"), "Part 1 The Start");
/// ```
#[must_use]
pub fn sanitize_title(title: &str) -> String {
    FORBIDDEN_TITLE_CHARS.replace_all(title, "").trim().to_string()
}

/// Parse request headers written as `key: value` lines
///
/// Lines without a `": "` separator are ignored, so a header block copied from
/// browser dev tools can be pasted as-is.
///
/// # Examples
///
/// ```
/// use comic_dl::utils::parse_header_lines;
///
/// let headers = parse_header_lines("user-agent: test\nbroken line\nreferer: https://a.test/x\n");
/// assert_eq!(headers.len(), 2);
/// assert_eq!(headers[1], ("referer".to_string(), "https://a.test/x".to_string()));
/// ```
pub fn parse_header_lines(raw: &str) -> Vec<(String, String)> {
    raw.lines()
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let (key, value) = line.split_once(": ")?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Resolve the destination directory for a target's optional sub-directory
///
/// An empty `sub_dir` means the root itself. Otherwise an existing directory with
/// exactly that name wins; failing that, the first existing directory (in name
/// order) whose name starts with `sub_dir`; failing that, `root/sub_dir`, which the
/// crawler will create on demand.
pub async fn resolve_destination(root: &Path, sub_dir: &str) -> PathBuf {
    let sub_dir = sub_dir.trim();
    if sub_dir.is_empty() {
        return root.to_path_buf();
    }

    let exact = root.join(sub_dir);
    if is_dir(&exact).await {
        return exact;
    }

    let mut candidates = match prefixed_dirs(root, sub_dir).await {
        Ok(candidates) => candidates,
        Err(e) => {
            tracing::debug!(root = %root.display(), error = %e, "Cannot list download root");
            Vec::new()
        }
    };
    candidates.sort();

    match candidates.into_iter().next() {
        Some(prefixed) => {
            tracing::info!(
                sub_dir = sub_dir,
                dest = %prefixed.display(),
                "Redirecting destination to prefix match"
            );
            prefixed
        }
        None => exact,
    }
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|meta| meta.is_dir())
}

/// Directories directly under `root` whose name starts with `prefix`
async fn prefixed_dirs(root: &Path, prefix: &str) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(root).await?;
    let mut found = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let matches = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(prefix));
        if matches && is_dir(&path).await {
            found.push(path);
        }
    }
    Ok(found)
}
