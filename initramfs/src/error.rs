// ABOUTME: Error taxonomy for mount requests.
// ABOUTME: Validation problems, program failures, wait timeouts, and I/O failures.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::duration::format_go_duration;

/// A request that can never be mounted. Always detected before the mount
/// program runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("impossible to fsck a tmpfs")]
    FsckOnTmpfs,

    #[error("invalid options")]
    InvalidOptions,

    #[error("missing arguments for overlayfs mount: at least one lowerdir is required")]
    MissingLowerDir,

    #[error("a workdir for an overlayfs mount was specified but upperdir is missing")]
    WorkDirWithoutUpperDir,

    #[error("an upperdir for an overlayfs mount was specified but workdir is missing")]
    UpperDirWithoutWorkDir,

    #[error("mount with dm-verity was requested but a hash device and root hash were not specified")]
    VerityMissingHashDeviceAndRootHash,

    #[error("mount with dm-verity was requested but a hash device was not specified")]
    VerityMissingHashDevice,

    #[error("mount with dm-verity was requested but a root hash was not specified")]
    VerityMissingRootHash,

    #[error("{label} contains forbidden characters. {value:?} contains one of {forbidden:?}")]
    ForbiddenCharacters {
        label: &'static str,
        value: String,
        forbidden: &'static str,
    },
}

#[derive(Debug, Error)]
pub enum MountError {
    #[error("cannot mount {what:?} at {target:?}: {cause}")]
    Invalid {
        what: String,
        target: String,
        #[source]
        cause: ValidationError,
    },

    #[error("{0}")]
    Execution(String),

    #[error("timed out after {} waiting for mount {what} on {target}", format_go_duration(.timeout))]
    Timeout {
        timeout: std::time::Duration,
        what: String,
        target: String,
    },

    #[error("cannot check whether {target:?} is mounted: {source}")]
    MountState {
        target: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to {action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, MountError>;
