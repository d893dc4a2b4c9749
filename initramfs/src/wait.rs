// ABOUTME: Blocks until a mount appears (or disappears) or a deadline passes.
// ABOUTME: Time and mount state are injected so the loop is deterministic under test.

use std::io;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{MountError, Result};

/// How long a mount may take to become active after systemd-mount returns.
pub const DEFAULT_MOUNT_TIMEOUT: Duration = Duration::from_secs(90);

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

pub trait MountState: Send + Sync {
    fn is_mounted(&self, target: &str) -> io::Result<bool>;
}

#[derive(Debug, Clone, Copy)]
pub struct WaitParams<'a> {
    pub what: &'a str,
    pub target: &'a str,
    /// `true` to wait for a mount, `false` to wait for an unmount.
    pub expect_mounted: bool,
    pub timeout: Duration,
    pub poll_interval: Duration,
}

/// Poll `state` until `target` reaches the expected mount state.
///
/// The clock is read once to anchor the deadline and once before every
/// predicate call; nothing else consults time.
pub fn wait_for_mount(clock: &dyn Clock, state: &dyn MountState, params: WaitParams<'_>) -> Result<()> {
    let start = clock.now();
    let mut now = clock.now();
    while now.saturating_duration_since(start) < params.timeout {
        let mounted = state
            .is_mounted(params.target)
            .map_err(|source| MountError::MountState {
                target: params.target.to_string(),
                source,
            })?;
        if mounted == params.expect_mounted {
            debug!(
                target = params.target,
                mounted,
                elapsed_ms = now.saturating_duration_since(start).as_millis() as u64,
                "mount state reached"
            );
            return Ok(());
        }

        if !params.poll_interval.is_zero() {
            std::thread::sleep(params.poll_interval);
        }
        now = clock.now();
    }

    Err(MountError::Timeout {
        timeout: params.timeout,
        what: params.what.to_string(),
        target: params.target.to_string(),
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays a fixed sequence of instants and counts how many were taken.
    pub struct ScriptedClock {
        times: Mutex<VecDeque<Instant>>,
        calls: Mutex<usize>,
    }

    impl ScriptedClock {
        pub fn new(times: impl IntoIterator<Item = Instant>) -> Self {
            Self {
                times: Mutex::new(times.into_iter().collect()),
                calls: Mutex::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    impl Clock for ScriptedClock {
        fn now(&self) -> Instant {
            *self.calls.lock().unwrap() += 1;
            self.times
                .lock()
                .unwrap()
                .pop_front()
                .expect("too many clock reads")
        }
    }

    /// Replays a fixed sequence of mount-state answers.
    pub struct ScriptedState {
        answers: Mutex<VecDeque<io::Result<bool>>>,
        queried: Mutex<Vec<String>>,
    }

    impl ScriptedState {
        pub fn new(answers: impl IntoIterator<Item = io::Result<bool>>) -> Self {
            Self {
                answers: Mutex::new(answers.into_iter().collect()),
                queried: Mutex::new(Vec::new()),
            }
        }

        pub fn returning(answers: &[bool]) -> Self {
            Self::new(answers.iter().copied().map(Ok))
        }

        pub fn queried(&self) -> Vec<String> {
            self.queried.lock().unwrap().clone()
        }
    }

    impl MountState for ScriptedState {
        fn is_mounted(&self, target: &str) -> io::Result<bool> {
            self.queried.lock().unwrap().push(target.to_string());
            self.answers
                .lock()
                .unwrap()
                .pop_front()
                .expect("too many is_mounted calls")
        }
    }
}
