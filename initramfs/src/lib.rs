// ABOUTME: MobileOS initramfs mount orchestration.
// ABOUTME: Turns declarative mount requests into systemd-mount calls and boot ordering drop-ins.

pub mod command;
pub mod config;
pub mod duration;
pub mod error;
pub mod forbidden;
pub mod fsopts;
pub mod logging;
pub mod mount;
pub mod mountinfo;
pub mod overrides;
mod path;
pub mod request;
pub mod runner;
pub mod unitname;
pub mod wait;

pub use command::{compile, MountCommand};
pub use config::Settings;
pub use error::{MountError, Result, ValidationError};
pub use fsopts::{AppendOptions, DmVerityOptions, FsOptions, OverlayFsOptions};
pub use mount::{do_systemd_mount, spawn_mount, Mounter};
pub use request::{MountOptions, MountRequest};
pub use wait::{Clock, MountState, SystemClock};
