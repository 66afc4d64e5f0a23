// Output file naming

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempPath;

use super::errors::DownloadError;

/// Returns a path in `dir` that does not exist yet.
///
/// Probes `base.ext`, then `base(1).ext`, `base(2).ext`, ... until a free
/// name is found. The check is not atomic: another writer can still claim
/// the returned path before the caller creates it.
pub fn unique_file_path(dir: &Path, file_name: &str) -> Result<PathBuf, DownloadError> {
    let (base, ext) = split_file_name(file_name);

    let mut candidate = dir.join(file_name);
    let mut count: u64 = 1;

    while exists(&candidate).map_err(|e| DownloadError::write_failure(&candidate, e))? {
        candidate = dir.join(format!("{}({}){}", base, count, ext));
        count = count
            .checked_add(1)
            .ok_or_else(|| DownloadError::write_failure(dir, "ran out of numbered file names"))?;
    }

    Ok(candidate)
}

/// Move a finished temp file to `dest` without replacing anything already there.
///
/// A file that claimed `dest` after `unique_file_path` picked it stays untouched;
/// the temp file is deleted and the write fails.
pub(crate) fn persist_new(temp: TempPath, dest: &Path) -> Result<(), DownloadError> {
    temp.persist_noclobber(dest).map_err(|e| {
        if e.error.kind() == io::ErrorKind::AlreadyExists {
            DownloadError::write_failure(dest, "another file appeared at this path")
        } else {
            DownloadError::write_failure(dest, e.error)
        }
    })
}

/// Splits `name.ext` into (`name`, `.ext`); dotfiles and names without an
/// extension keep the whole name as base
fn split_file_name(file_name: &str) -> (&str, &str) {
    match file_name.rfind('.') {
        Some(idx) if idx > 0 => file_name.split_at(idx),
        _ => (file_name, ""),
    }
}

fn exists(path: &Path) -> io::Result<bool> {
    match std::fs::symlink_metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Make a media title usable as a file stem
pub fn sanitize_file_stem(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = cleaned.trim().trim_matches('.').trim();
    if trimmed.is_empty() {
        "download".to_string()
    } else {
        trimmed.to_string()
    }
}
