// ABOUTME: Performs one mount request end to end.
// ABOUTME: Compile, run systemd-mount, wait for the result, then pin boot ordering.

use std::sync::Arc;
use std::thread::JoinHandle;

use tracing::{info, info_span};

use crate::command::compile;
use crate::config::Settings;
use crate::error::Result;
use crate::mountinfo::ProcMountInfo;
use crate::overrides;
use crate::request::MountRequest;
use crate::runner::{CommandRunner, SystemRunner};
use crate::wait::{wait_for_mount, Clock, MountState, SystemClock, WaitParams};

pub struct Mounter {
    settings: Settings,
    runner: Box<dyn CommandRunner>,
    clock: Box<dyn Clock>,
    state: Box<dyn MountState>,
}

impl Mounter {
    /// A mounter wired to the real system: spawns the configured program,
    /// reads /proc/self/mountinfo, and uses the monotonic clock.
    pub fn new(settings: Settings) -> Self {
        Self::with_parts(
            settings,
            Box::new(SystemRunner),
            Box::new(SystemClock),
            Box::new(ProcMountInfo::new()),
        )
    }

    pub fn with_parts(
        settings: Settings,
        runner: Box<dyn CommandRunner>,
        clock: Box<dyn Clock>,
        state: Box<dyn MountState>,
    ) -> Self {
        Self {
            settings,
            runner,
            clock,
            state,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn do_mount(&self, request: &MountRequest) -> Result<()> {
        let _span = info_span!("mount", what = %request.what, target = %request.target).entered();
        let opts = &request.options;

        let command = compile(&self.settings.program, request)?;
        info!(args = ?command.args, "running {}", command.program);
        self.runner.run(&command)?;

        if !opts.no_wait {
            wait_for_mount(
                self.clock.as_ref(),
                self.state.as_ref(),
                WaitParams {
                    what: &request.what,
                    target: &request.target,
                    expect_mounted: !opts.umount,
                    timeout: self.settings.timeout(),
                    poll_interval: self.settings.poll_interval(),
                },
            )?;
        }

        overrides::apply(&self.settings.root_dir, &request.target, opts.ephemeral)?;

        if opts.umount {
            info!("unmounted");
        } else {
            info!(ephemeral = opts.ephemeral, "mounted");
        }
        Ok(())
    }
}

/// Run `request` on a dedicated thread. Callers that need a deadline of their
/// own can race the handle against it; the mount itself is never cancelled.
pub fn spawn_mount(mounter: Arc<Mounter>, request: MountRequest) -> JoinHandle<Result<()>> {
    std::thread::spawn(move || mounter.do_mount(&request))
}

pub fn do_systemd_mount(settings: Settings, request: &MountRequest) -> Result<()> {
    Mounter::new(settings).do_mount(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsopts::{DmVerityOptions, FsOptions, OverlayFsOptions};
    use crate::overrides::{override_path, ORDERED_TARGETS};
    use crate::request::MountOptions;
    use crate::runner::testing::RecordingRunner;
    use crate::wait::testing::{ScriptedClock, ScriptedState};
    use std::time::{Duration, Instant};

    struct Fixture {
        root: tempfile::TempDir,
        runner: Arc<RecordingRunner>,
        clock: Arc<ScriptedClock>,
        state: Arc<ScriptedState>,
    }

    // Boxed collaborators are shared with the fixture so calls can be
    // inspected after the mounter is done with them.
    struct Shared<T>(Arc<T>);

    impl<T: CommandRunner> CommandRunner for Shared<T> {
        fn run(&self, command: &crate::command::MountCommand) -> Result<()> {
            self.0.run(command)
        }
    }

    impl<T: Clock> Clock for Shared<T> {
        fn now(&self) -> Instant {
            self.0.now()
        }
    }

    impl<T: MountState> MountState for Shared<T> {
        fn is_mounted(&self, target: &str) -> std::io::Result<bool> {
            self.0.is_mounted(target)
        }
    }

    impl Fixture {
        fn new(runner: RecordingRunner, times: Vec<Instant>, answers: &[bool]) -> Self {
            Self {
                root: tempfile::tempdir().unwrap(),
                runner: Arc::new(runner),
                clock: Arc::new(ScriptedClock::new(times)),
                state: Arc::new(ScriptedState::returning(answers)),
            }
        }

        fn happy() -> Self {
            let start = Instant::now();
            Self::new(RecordingRunner::default(), vec![start, start], &[true])
        }

        fn mounter(&self) -> Mounter {
            let settings = Settings {
                program: "mount-tool".to_string(),
                root_dir: self.root.path().to_path_buf(),
                ..Settings::default()
            };
            Mounter::with_parts(
                settings,
                Box::new(Shared(Arc::clone(&self.runner))),
                Box::new(Shared(Arc::clone(&self.clock))),
                Box::new(Shared(Arc::clone(&self.state))),
            )
        }

        fn override_for(&self, unit: &str, target: &str) -> Option<String> {
            std::fs::read_to_string(override_path(self.root.path(), unit, target)).ok()
        }
    }

    #[test]
    fn happy_default() {
        let fx = Fixture::happy();
        let request = MountRequest::new("/dev/sda3", "/run/mnt/data");

        fx.mounter().do_mount(&request).unwrap();

        assert_eq!(
            fx.runner.calls(),
            vec![vec![
                "mount-tool",
                "/dev/sda3",
                "/run/mnt/data",
                "--no-pager",
                "--no-ask-password",
                "--fsck=no",
                "--property=Before=initrd-fs.target",
            ]]
        );
        assert_eq!(fx.clock.calls(), 2);
        assert_eq!(fx.state.queried(), vec!["/run/mnt/data"]);
        for unit in ORDERED_TARGETS {
            assert_eq!(
                fx.override_for(unit, "/run/mnt/data").as_deref(),
                Some("[Unit]\nWants=run-mnt-data.mount\n")
            );
        }
    }

    #[test]
    fn times_out_waiting_for_mount() {
        let start = Instant::now();
        let fx = Fixture::new(
            RecordingRunner::default(),
            vec![start, start, start, start + Duration::from_secs(120)],
            &[false, false],
        );

        let err = fx.mounter().do_mount(&MountRequest::new("what", "where")).unwrap_err();

        assert_eq!(err.to_string(), "timed out after 1m30s waiting for mount what on where");
        assert_eq!(fx.clock.calls(), 4);
        assert_eq!(fx.state.queried().len(), 2);
        // A mount that never showed up must not gate boot targets.
        for unit in ORDERED_TARGETS {
            assert!(fx.override_for(unit, "where").is_none());
        }
    }

    #[test]
    fn program_failure_is_verbatim_and_skips_wait() {
        let fx = Fixture::new(RecordingRunner::failing("mocked error"), Vec::new(), &[]);

        let err = fx
            .mounter()
            .do_mount(&MountRequest::new("something", "somewhere only we know"))
            .unwrap_err();

        assert_eq!(err.to_string(), "mocked error");
        assert_eq!(fx.clock.calls(), 0);
        assert!(fx.state.queried().is_empty());
    }

    #[test]
    fn validation_failure_never_runs_program() {
        let fx = Fixture::new(RecordingRunner::default(), Vec::new(), &[]);
        let request = MountRequest::new("what", "where").with_options(MountOptions {
            fs_options: Some(
                OverlayFsOptions {
                    lower_dirs: vec!["/lower1".into()],
                    upper_dir: "/upper\\,:\" ".into(),
                    work_dir: "/work".into(),
                }
                .into(),
            ),
            ..Default::default()
        });

        let err = fx.mounter().do_mount(&request).unwrap_err();

        assert_eq!(
            err.to_string(),
            r#"cannot mount "what" at "where": upperdir overlayfs mount option contains forbidden characters. "/upper\\,:\" " contains one of "\\,:\" ""#
        );
        assert!(fx.runner.calls().is_empty());
        assert_eq!(fx.clock.calls(), 0);
    }

    #[test]
    fn forbidden_option_paths_never_reach_the_program() {
        let overlay = |lower: &str, work: &str| -> FsOptions {
            OverlayFsOptions {
                lower_dirs: vec![lower.into()],
                upper_dir: "/upper".into(),
                work_dir: work.into(),
            }
            .into()
        };
        let cases = [
            (overlay("/lower1,", "/work"), "lowerdir overlayfs mount option"),
            (overlay("/lower1", "/work:"), "workdir overlayfs mount option"),
            (
                FsOptions::from(DmVerityOptions {
                    hash_device: "test.verity\\".into(),
                    root_hash: "00000000000000000000000000000000".into(),
                    hash_offset: 0,
                }),
                "dm-verity hash device path",
            ),
        ];

        for (fs_options, label) in cases {
            let fx = Fixture::new(RecordingRunner::default(), Vec::new(), &[]);
            let request = MountRequest::new("what", "where").with_options(MountOptions {
                fs_options: Some(fs_options),
                ..Default::default()
            });

            let err = fx.mounter().do_mount(&request).unwrap_err();

            assert!(err.to_string().contains(label), "{err}");
            assert!(fx.runner.calls().is_empty(), "{label}");
            assert_eq!(fx.clock.calls(), 0);
            assert!(fx.override_for("initrd-fs.target", "where").is_none());
        }
    }

    #[test]
    fn no_wait_skips_polling_but_writes_overrides() {
        let fx = Fixture::new(RecordingRunner::default(), Vec::new(), &[]);
        let request = MountRequest::new("tmpfs", "/run/mnt/data").with_options(MountOptions {
            no_wait: true,
            ..Default::default()
        });

        fx.mounter().do_mount(&request).unwrap();

        assert!(fx.runner.calls()[0].contains(&"--no-block".to_string()));
        assert_eq!(fx.clock.calls(), 0);
        assert!(fx.state.queried().is_empty());
        for unit in ORDERED_TARGETS {
            assert!(fx.override_for(unit, "/run/mnt/data").is_some());
        }
    }

    #[test]
    fn ephemeral_removes_overrides() {
        let fx = Fixture::happy();
        overrides::apply(fx.root.path(), "/run/mnt/data", false).unwrap();

        let request = MountRequest::new("tmpfs", "/run/mnt/data").with_options(MountOptions {
            tmpfs: true,
            ephemeral: true,
            ..Default::default()
        });
        fx.mounter().do_mount(&request).unwrap();

        assert!(!fx.runner.calls()[0].iter().any(|a| a.starts_with("--property=")));
        for unit in ORDERED_TARGETS {
            assert!(fx.override_for(unit, "/run/mnt/data").is_none());
        }
    }

    #[test]
    fn umount_waits_for_mount_to_disappear() {
        let start = Instant::now();
        let fx = Fixture::new(RecordingRunner::default(), vec![start, start], &[false]);
        let request = MountRequest::new("tmpfs", "/run/mnt/data").with_options(MountOptions {
            umount: true,
            ..Default::default()
        });

        fx.mounter().do_mount(&request).unwrap();

        assert_eq!(
            fx.runner.calls()[0][..5],
            ["mount-tool", "/run/mnt/data", "--umount", "--no-pager", "--no-ask-password"]
        );
        assert_eq!(fx.state.queried(), vec!["/run/mnt/data"]);
    }

    #[test]
    fn verity_mount() {
        let fx = Fixture::happy();
        let request = MountRequest::new("/run/mnt/data/some.snap", "/run/mnt/base").with_options(
            MountOptions {
                fs_options: Some(
                    DmVerityOptions {
                        hash_device: "test.verity".into(),
                        root_hash: "00000000000000000000000000000000".into(),
                        hash_offset: 0,
                    }
                    .into(),
                ),
                ..Default::default()
            },
        );

        fx.mounter().do_mount(&request).unwrap();

        let call = &fx.runner.calls()[0];
        assert_eq!(
            call.last().map(String::as_str),
            Some("--options=verity.hashdevice=test.verity,verity.roothash=00000000000000000000000000000000")
        );
        assert!(fx.override_for("local-fs.target", "/run/mnt/base").is_some());
    }

    #[test]
    fn spawned_mount_reports_result() {
        let fx = Fixture::happy();
        let mounter = Arc::new(fx.mounter());

        let handle = spawn_mount(Arc::clone(&mounter), MountRequest::new("/dev/sda3", "/run/mnt/data"));
        handle.join().unwrap().unwrap();

        assert_eq!(fx.runner.calls().len(), 1);
        assert_eq!(mounter.settings().root_dir, fx.root.path());
        assert!(override_path(fx.root.path(), "initrd-fs.target", "/run/mnt/data").exists());
    }
}
