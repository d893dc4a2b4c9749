// ABOUTME: Compiles a MountRequest into a systemd-mount command line.
// ABOUTME: All validation happens here, before anything is executed.

use crate::error::{MountError, Result, ValidationError};
use crate::request::MountRequest;

pub const BEFORE_INITRD_FS: &str = "--property=Before=initrd-fs.target";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl MountCommand {
    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.args.len() + 1);
        argv.push(self.program.clone());
        argv.extend(self.args.iter().cloned());
        argv
    }
}

pub fn compile(program: &str, request: &MountRequest) -> Result<MountCommand> {
    build_args(request)
        .map(|args| MountCommand {
            program: program.to_string(),
            args,
        })
        .map_err(|cause| MountError::Invalid {
            what: request.what.clone(),
            target: request.target.clone(),
            cause,
        })
}

fn build_args(request: &MountRequest) -> std::result::Result<Vec<String>, ValidationError> {
    let opts = &request.options;

    if opts.tmpfs && opts.needs_fsck {
        return Err(ValidationError::FsckOnTmpfs);
    }

    let mut args = if opts.umount {
        vec![request.target.clone(), "--umount".to_string()]
    } else {
        vec![request.effective_what().to_string(), request.target.clone()]
    };
    args.push("--no-pager".to_string());
    args.push("--no-ask-password".to_string());

    let fs_type = match &opts.fs_options {
        Some(fs) => fs.fs_type()?,
        None => None,
    };
    if !opts.umount {
        if opts.tmpfs {
            args.push("--type=tmpfs".to_string());
        } else if let Some(fs_type) = fs_type {
            args.push(format!("--type={fs_type}"));
        }
    }

    args.push(if opts.needs_fsck { "--fsck=yes" } else { "--fsck=no" }.to_string());

    if opts.no_wait {
        args.push("--no-block".to_string());
    }

    if !opts.ephemeral {
        args.push(BEFORE_INITRD_FS.to_string());
    }

    let mut options = Vec::new();
    for (set, flag) in [
        (opts.no_dev, "nodev"),
        (opts.no_suid, "nosuid"),
        (opts.no_exec, "noexec"),
        (opts.bind, "bind"),
        (opts.read_only, "ro"),
        (opts.private, "private"),
    ] {
        if set {
            options.push(flag.to_string());
        }
    }
    if let Some(fs) = &opts.fs_options {
        options = fs.append_options(options)?;
    }
    // Validated either way, but an unmount only names its target.
    if !opts.umount && !options.is_empty() {
        args.push(format!("--options={}", options.join(",")));
    }

    Ok(args)
}
