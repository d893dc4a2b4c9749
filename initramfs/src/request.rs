// ABOUTME: A single fully-specified mount request.
// ABOUTME: What to mount, where, and the flags steering systemd-mount.

use crate::fsopts::FsOptions;

#[derive(Debug, Default)]
pub struct MountOptions {
    /// Mount a fresh tmpfs; the request's `what` is ignored.
    pub tmpfs: bool,
    pub needs_fsck: bool,
    /// Scoped to the initramfs: do not order initrd-fs.target or
    /// local-fs.target after this mount.
    pub ephemeral: bool,
    pub no_wait: bool,
    pub no_dev: bool,
    pub no_suid: bool,
    pub no_exec: bool,
    pub bind: bool,
    pub read_only: bool,
    pub private: bool,
    pub umount: bool,
    pub fs_options: Option<FsOptions>,
}

#[derive(Debug)]
pub struct MountRequest {
    pub what: String,
    pub target: String,
    pub options: MountOptions,
}

impl MountRequest {
    pub fn new(what: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            what: what.into(),
            target: target.into(),
            options: MountOptions::default(),
        }
    }

    pub fn with_options(mut self, options: MountOptions) -> Self {
        self.options = options;
        self
    }

    pub fn effective_what(&self) -> &str {
        if self.options.tmpfs {
            "tmpfs"
        } else {
            &self.what
        }
    }
}
