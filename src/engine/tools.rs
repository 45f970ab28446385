//! Path, key and date utilities

use anyhow::{Result, bail};
use chrono::{Days, NaiveDate};
use std::path::{Path, PathBuf};

/// Convert absolute path to relative path from base
pub fn path_relative_to(path: &Path, base: &Path) -> Option<PathBuf> {
    path.strip_prefix(base).ok().map(|p| p.to_path_buf())
}

/// Object key for a relative path: components joined with `/` on every platform.
pub fn path_to_key(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Check if a file should be excluded based on OS-specific hidden files
pub fn is_os_hidden_file(path: &Path) -> bool {
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        match name {
            // Windows
            "Thumbs.db" | "ehthumbs.db" | "Desktop.ini" => true,
            // Dotfiles: .DS_Store, ._resource forks, .directory, partial uploads
            _ => name.starts_with('.'),
        }
    } else {
        false
    }
}

/// Parse a run date given as `YYYY-MM-DD` or `YYYYMMDD`.
pub fn parse_run_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();
    for fmt in ["%Y-%m-%d", "%Y%m%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d);
        }
    }
    bail!("invalid date '{}': expected YYYY-MM-DD or YYYYMMDD", s)
}

/// Listing prefix for one day, `yyyyMMdd`.
pub fn day_prefix(day: NaiveDate) -> String {
    day.format("%Y%m%d").to_string()
}

/// One prefix per day from `start` to `end`, inclusive.
pub fn day_prefixes(start: NaiveDate, end: NaiveDate) -> Result<Vec<String>> {
    if end < start {
        bail!("end date {} is before start date {}", end, start);
    }
    let mut out = Vec::new();
    let mut day = start;
    while day <= end {
        out.push(day_prefix(day));
        day = match day.checked_add_days(Days::new(1)) {
            Some(next) => next,
            None => break,
        };
    }
    Ok(out)
}
