// ABOUTME: Answers "is this path a mount point" from /proc/self/mountinfo.
// ABOUTME: Production implementation of the MountState predicate.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::path::clean_path;
use crate::wait::MountState;

const PROC_SELF_MOUNTINFO: &str = "/proc/self/mountinfo";

#[derive(Debug, Clone)]
pub struct ProcMountInfo {
    path: PathBuf,
}

impl ProcMountInfo {
    pub fn new() -> Self {
        Self::at(PROC_SELF_MOUNTINFO)
    }

    pub fn at(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl Default for ProcMountInfo {
    fn default() -> Self {
        Self::new()
    }
}

impl MountState for ProcMountInfo {
    fn is_mounted(&self, target: &str) -> io::Result<bool> {
        let content = fs::read_to_string(&self.path)?;
        let target = clean_path(target);
        Ok(mount_points(&content).any(|mp| mp == target))
    }
}

/// Mount point column (the fifth field) of every mountinfo line, unescaped.
pub fn mount_points(content: &str) -> impl Iterator<Item = String> + '_ {
    content
        .lines()
        .filter_map(|line| line.split_whitespace().nth(4))
        .map(unescape_octal)
}

// The kernel writes space, tab, newline and backslash as \ooo.
fn unescape_octal(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() && is_octal_triplet(&bytes[i + 1..i + 4]) {
            let value = bytes[i + 1..i + 4]
                .iter()
                .fold(0u32, |acc, d| acc * 8 + u32::from(d - b'0'));
            if let Ok(b) = u8::try_from(value) {
                out.push(b);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn is_octal_triplet(digits: &[u8]) -> bool {
    digits.len() == 3 && digits.iter().all(|d| (b'0'..=b'7').contains(d))
}
