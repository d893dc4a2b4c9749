// ABOUTME: Filesystem-specific mount options (overlayfs, dm-verity, custom).
// ABOUTME: Each flavour validates its own fields and appends fragments to --options=.

use std::any::Any;
use std::fmt;

use serde::Deserialize;

use crate::error::ValidationError;
use crate::forbidden::check_forbidden;

/// Something that can contribute fragments to the `--options=` argument.
pub trait AppendOptions: fmt::Debug {
    fn append_options(&self, options: Vec<String>) -> Result<Vec<String>, ValidationError>;
}

/// Options for an overlayfs mount. A mount with lowerdirs only is a
/// read-only overlay.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct OverlayFsOptions {
    #[serde(default)]
    pub lower_dirs: Vec<String>,
    #[serde(default)]
    pub upper_dir: String,
    #[serde(default)]
    pub work_dir: String,
}

impl AppendOptions for OverlayFsOptions {
    fn append_options(&self, mut options: Vec<String>) -> Result<Vec<String>, ValidationError> {
        if self.lower_dirs.is_empty() {
            return Err(ValidationError::MissingLowerDir);
        }
        if !self.work_dir.is_empty() && self.upper_dir.is_empty() {
            return Err(ValidationError::WorkDirWithoutUpperDir);
        }
        if !self.upper_dir.is_empty() && self.work_dir.is_empty() {
            return Err(ValidationError::UpperDirWithoutWorkDir);
        }

        for dir in &self.lower_dirs {
            check_forbidden(dir, "lowerdir overlayfs mount option")?;
        }
        check_forbidden(&self.upper_dir, "upperdir overlayfs mount option")?;
        check_forbidden(&self.work_dir, "workdir overlayfs mount option")?;

        options.push(format!("lowerdir={}", self.lower_dirs.join(":")));
        if !self.upper_dir.is_empty() {
            options.push(format!("upperdir={}", self.upper_dir));
        }
        if !self.work_dir.is_empty() {
            options.push(format!("workdir={}", self.work_dir));
        }
        Ok(options)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct DmVerityOptions {
    #[serde(default)]
    pub hash_device: String,
    #[serde(default)]
    pub root_hash: String,
    #[serde(default)]
    pub hash_offset: u64,
}

impl AppendOptions for DmVerityOptions {
    fn append_options(&self, mut options: Vec<String>) -> Result<Vec<String>, ValidationError> {
        match (self.hash_device.is_empty(), self.root_hash.is_empty()) {
            (true, true) if self.hash_offset > 0 => {
                return Err(ValidationError::VerityMissingHashDeviceAndRootHash);
            }
            (true, false) => return Err(ValidationError::VerityMissingHashDevice),
            (false, true) => return Err(ValidationError::VerityMissingRootHash),
            _ => {}
        }

        check_forbidden(&self.hash_device, "dm-verity hash device path")?;

        if !self.hash_device.is_empty() {
            options.push(format!("verity.hashdevice={}", self.hash_device));
            options.push(format!("verity.roothash={}", self.root_hash));
        }
        if self.hash_offset > 0 {
            options.push(format!("verity.hashoffset={}", self.hash_offset));
        }
        Ok(options)
    }
}

#[derive(Debug)]
pub enum FsOptions {
    Overlay(OverlayFsOptions),
    DmVerity(DmVerityOptions),
    /// Caller-provided fragments; the filesystem type is left to systemd.
    Custom(Box<dyn AppendOptions + Send + Sync>),
    /// A value whose type is only known at runtime. Accepted if it is one of
    /// the known option types, rejected as invalid otherwise.
    Opaque(Box<dyn Any + Send + Sync>),
}

enum Resolved<'a> {
    Overlay(&'a OverlayFsOptions),
    DmVerity(&'a DmVerityOptions),
    Custom(&'a dyn AppendOptions),
}

impl FsOptions {
    fn resolve(&self) -> Result<Resolved<'_>, ValidationError> {
        match self {
            FsOptions::Overlay(o) => Ok(Resolved::Overlay(o)),
            FsOptions::DmVerity(o) => Ok(Resolved::DmVerity(o)),
            FsOptions::Custom(o) => Ok(Resolved::Custom(o.as_ref())),
            FsOptions::Opaque(any) => {
                if let Some(o) = any.downcast_ref::<OverlayFsOptions>() {
                    Ok(Resolved::Overlay(o))
                } else if let Some(o) = any.downcast_ref::<DmVerityOptions>() {
                    Ok(Resolved::DmVerity(o))
                } else {
                    Err(ValidationError::InvalidOptions)
                }
            }
        }
    }

    pub fn fs_type(&self) -> Result<Option<&'static str>, ValidationError> {
        Ok(match self.resolve()? {
            Resolved::Overlay(_) => Some("overlay"),
            Resolved::DmVerity(_) | Resolved::Custom(_) => None,
        })
    }

    pub fn append_options(&self, options: Vec<String>) -> Result<Vec<String>, ValidationError> {
        match self.resolve()? {
            Resolved::Overlay(o) => o.append_options(options),
            Resolved::DmVerity(o) => o.append_options(options),
            Resolved::Custom(o) => o.append_options(options),
        }
    }
}

impl From<OverlayFsOptions> for FsOptions {
    fn from(o: OverlayFsOptions) -> Self {
        FsOptions::Overlay(o)
    }
}

impl From<DmVerityOptions> for FsOptions {
    fn from(o: DmVerityOptions) -> Self {
        FsOptions::DmVerity(o)
    }
}
