//! External tool invocation.
//!
//! The inference tool and the quartet tool are black boxes: the pipeline
//! hands them arguments, waits, and later looks for the files they were
//! supposed to produce. A failed run is therefore never an error here; it
//! surfaces downstream as a missing best tree or a short report.
//!
//! Keeping the runner behind a trait lets the orchestrators and the quartet
//! calculator be exercised in tests with fakes that write canned output (or
//! count invocations).

use std::ffi::OsString;
use std::fs::File;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, warn};

/// Capability to run an external tool to completion.
///
/// Implementations must be `Sync`: replicate-level distance work is spread
/// over a rayon pool and shares one runner.
pub trait ToolRunner: Sync {
    /// Run `program` with `args` and wait for it to terminate. The exit
    /// status is not interpreted; output files either appear or they don't.
    fn run(&self, program: &Path, args: &[OsString]);

    /// Like [`ToolRunner::run`], but the child's stdout is captured into
    /// `report`. Used for tools that print their report instead of writing
    /// a file. If `report` cannot be created the run is skipped.
    fn run_to_file(&self, program: &Path, args: &[OsString], report: &Path);
}

/// Runner backed by `std::process::Command`.
#[derive(Debug, Default)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run(&self, program: &Path, args: &[OsString]) {
        debug!(program = %program.display(), ?args, "spawning tool");
        match Command::new(program).args(args).status() {
            Ok(status) => debug!(%status, "tool finished"),
            Err(e) => warn!(program = %program.display(), error = %e, "failed to spawn tool"),
        }
    }

    fn run_to_file(&self, program: &Path, args: &[OsString], report: &Path) {
        let out = match File::create(report) {
            Ok(f) => f,
            Err(e) => {
                warn!(report = %report.display(), error = %e, "cannot create report file");
                return;
            }
        };
        debug!(program = %program.display(), ?args, report = %report.display(), "spawning tool");
        match Command::new(program)
            .args(args)
            .stdout(Stdio::from(out))
            .status()
        {
            Ok(status) => debug!(%status, "tool finished"),
            Err(e) => warn!(program = %program.display(), error = %e, "failed to spawn tool"),
        }
    }
}

pub mod testing {
    //! Fakes shared by unit and integration tests.
    //! Compiled unconditionally so `tests/` can use them too.

    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records every invocation; optionally delegates to a closure that
    /// fakes the tool's observable side effect (writing a tree or report).
    pub struct SpyRunner<F = fn(&Path, &[OsString], Option<&Path>)>
    where
        F: Fn(&Path, &[OsString], Option<&Path>) + Sync,
    {
        pub calls: AtomicUsize,
        pub invocations: Mutex<Vec<Vec<OsString>>>,
        effect: F,
    }

    fn no_effect(_: &Path, _: &[OsString], _: Option<&Path>) {}

    impl SpyRunner {
        /// A spy that only counts.
        pub fn counting() -> Self {
            SpyRunner::with_effect(no_effect as fn(&Path, &[OsString], Option<&Path>))
        }
    }

    impl<F> SpyRunner<F>
    where
        F: Fn(&Path, &[OsString], Option<&Path>) + Sync,
    {
        pub fn with_effect(effect: F) -> Self {
            SpyRunner {
                calls: AtomicUsize::new(0),
                invocations: Mutex::new(Vec::new()),
                effect,
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn record(&self, args: &[OsString]) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.invocations.lock().unwrap().push(args.to_vec());
        }
    }

    impl<F> ToolRunner for SpyRunner<F>
    where
        F: Fn(&Path, &[OsString], Option<&Path>) + Sync,
    {
        fn run(&self, program: &Path, args: &[OsString]) {
            self.record(args);
            (self.effect)(program, args, None);
        }

        fn run_to_file(&self, program: &Path, args: &[OsString], report: &Path) {
            self.record(args);
            (self.effect)(program, args, Some(report));
        }
    }
}
