// ABOUTME: Mount table configuration for the initramfs.
// ABOUTME: Reads TOML mount tables and produces typed Settings and MountRequest values.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::fsopts::{DmVerityOptions, FsOptions, OverlayFsOptions};
use crate::request::{MountOptions, MountRequest};
use crate::wait::DEFAULT_MOUNT_TIMEOUT;

pub const DEFAULT_MOUNT_PROGRAM: &str = "systemd-mount";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub program: String,
    /// Root under which run/systemd/system drop-ins are written.
    pub root_dir: PathBuf,
    pub timeout_secs: u64,
    pub poll_interval_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            program: DEFAULT_MOUNT_PROGRAM.to_string(),
            root_dir: PathBuf::from("/"),
            timeout_secs: DEFAULT_MOUNT_TIMEOUT.as_secs(),
            poll_interval_ms: 10,
        }
    }
}

impl Settings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MountEntry {
    #[serde(default)]
    pub what: String,
    #[serde(rename = "where")]
    pub target: String,
    #[serde(default)]
    pub tmpfs: bool,
    #[serde(default)]
    pub needs_fsck: bool,
    #[serde(default)]
    pub ephemeral: bool,
    #[serde(default)]
    pub no_wait: bool,
    #[serde(default)]
    pub no_dev: bool,
    #[serde(default)]
    pub no_suid: bool,
    #[serde(default)]
    pub no_exec: bool,
    #[serde(default)]
    pub bind: bool,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub umount: bool,
    pub overlay: Option<OverlayFsOptions>,
    pub dm_verity: Option<DmVerityOptions>,
}

impl MountEntry {
    pub fn to_request(&self) -> Result<MountRequest> {
        let fs_options = match (&self.overlay, &self.dm_verity) {
            (Some(_), Some(_)) => bail!(
                "mount of '{}' sets both overlay and dm_verity options",
                self.target
            ),
            (Some(o), None) => Some(FsOptions::Overlay(o.clone())),
            (None, Some(o)) => Some(FsOptions::DmVerity(o.clone())),
            (None, None) => None,
        };

        Ok(MountRequest::new(&self.what, &self.target).with_options(MountOptions {
            tmpfs: self.tmpfs,
            needs_fsck: self.needs_fsck,
            ephemeral: self.ephemeral,
            no_wait: self.no_wait,
            no_dev: self.no_dev,
            no_suid: self.no_suid,
            no_exec: self.no_exec,
            bind: self.bind,
            read_only: self.read_only,
            private: self.private,
            umount: self.umount,
            fs_options,
        }))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MountTable {
    pub settings: Option<Settings>,
    #[serde(default, rename = "mount")]
    pub mounts: Vec<MountEntry>,
}

pub fn parse_mount_table(toml_str: &str) -> Result<MountTable> {
    toml::from_str(toml_str).context("failed to parse mount table")
}

/// Load every `*.toml` table in `dir`, in file name order. Later files'
/// `[settings]` override earlier ones; mounts are concatenated.
pub fn load_mount_tables_from_dir(dir: &Path) -> Result<MountTable> {
    let mut table = MountTable::default();

    if !dir.exists() {
        return Ok(table);
    }

    let mut entries: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read mount table directory: {}", dir.display()))?
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .is_some_and(|ext| ext == "toml")
        })
        .collect();

    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let parsed = parse_mount_table(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        if parsed.settings.is_some() {
            table.settings = parsed.settings;
        }
        table.mounts.extend(parsed.mounts);
    }

    Ok(table)
}
