// ABOUTME: systemd unit-name escaping for filesystem paths.
// ABOUTME: Produces the same names as `systemd-escape --path`, e.g. /run/mnt/data -> run-mnt-data.

use crate::path::clean_path;

/// Escape `path` into the name systemd gives its mount unit (without the
/// `.mount` suffix).
pub fn escape_unit_name_path(path: &str) -> String {
    let cleaned = clean_path(path);
    if cleaned == "/" {
        return "-".to_string();
    }

    let trimmed = cleaned.trim_matches('/');
    let mut out = String::with_capacity(trimmed.len());
    for (i, b) in trimmed.bytes().enumerate() {
        match b {
            b'/' => out.push('-'),
            b'.' if i == 0 => out.push_str("\\x2e"),
            b if b.is_ascii_alphanumeric() || matches!(b, b':' | b'_' | b'.') => {
                out.push(char::from(b))
            }
            b => out.push_str(&format!("\\x{b:02x}")),
        }
    }
    out
}
