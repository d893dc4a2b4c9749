// ABOUTME: Boot-ordering drop-ins that make generic targets wait for a mount.
// ABOUTME: Writes or removes snap_bootstrap_<unit>.conf under initrd-fs/local-fs target drop-in dirs.

use std::fs;
use std::io::{self, Write};
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{MountError, Result};
use crate::unitname::escape_unit_name_path;

/// Targets that must not be reached before a non-ephemeral mount is up.
pub const ORDERED_TARGETS: [&str; 2] = ["initrd-fs.target", "local-fs.target"];

const SYSTEMD_RUNTIME_UNIT_DIR: &str = "run/systemd/system";

pub fn override_path(root: &Path, unit: &str, target: &str) -> PathBuf {
    root.join(SYSTEMD_RUNTIME_UNIT_DIR)
        .join(format!("{unit}.d"))
        .join(format!("snap_bootstrap_{}.conf", escape_unit_name_path(target)))
}

pub fn override_content(target: &str) -> String {
    format!("[Unit]\nWants={}.mount\n", escape_unit_name_path(target))
}

/// Make the drop-ins for `target` match `ephemeral`: absent for ephemeral
/// mounts, present otherwise.
pub fn apply(root: &Path, target: &str, ephemeral: bool) -> Result<()> {
    let content = override_content(target);
    for unit in ORDERED_TARGETS {
        let path = override_path(root, unit, target);
        if ephemeral {
            ensure_absent(&path)?;
        } else {
            ensure_file(&path, content.as_bytes())?;
        }
    }
    Ok(())
}

fn ensure_absent(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "removed boot ordering override");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_err("remove", path, e)),
    }
}

/// Write `content` to `path` unless it already holds exactly that. Returns
/// whether the file changed.
fn ensure_file(path: &Path, content: &[u8]) -> Result<bool> {
    match fs::read(path) {
        Ok(existing) if existing == content => return Ok(false),
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(io_err("read", path, e)),
    }

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|e| io_err("create", dir, e))?;
    atomic_write(path, content).map_err(|e| io_err("write", path, e))?;
    debug!(path = %path.display(), "wrote boot ordering override");
    Ok(true)
}

// Write to a sibling temp file and rename over the destination, so readers
// never see a half-written drop-in.
fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(format!(".{}~", std::process::id()));
    let tmp = PathBuf::from(tmp);

    let result = (|| {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o644)
            .open(&tmp)?;
        file.set_permissions(fs::Permissions::from_mode(0o644))?;
        file.write_all(content)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

fn io_err(action: &'static str, path: &Path, source: io::Error) -> MountError {
    MountError::Io {
        action,
        path: path.to_path_buf(),
        source,
    }
}
