// ABOUTME: Lexical path normalisation shared by unit naming and mount lookups.
// ABOUTME: Collapses separators and resolves . and .. without touching the filesystem.

/// Collapse repeated separators and resolve `.` and `..` components.
/// Relative paths are treated as rooted.
pub fn clean_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            p => parts.push(p),
        }
    }
    format!("/{}", parts.join("/"))
}
