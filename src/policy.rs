//! Interpretation of failed system calls.
//!
//! Every fallible step of the dispatcher goes through this module, which
//! decides between three outcomes:
//!
//! - **fatal**: the current process reports the error and exits with status 1.
//!   Inside a child this only ends the child; the shell keeps running.
//! - **skip**: the error is reported and the current command is abandoned, but
//!   the shell goes on reading lines. Only opening a redirect source is
//!   treated this way.
//! - **tolerate**: the error is expected and silently ignored. This covers a
//!   wait that finds no child (the kernel already reaped it, because the shell
//!   ignores `SIGCHLD`) or that was interrupted.

use nix::errno::Errno;
use std::fmt;

/// The kinds of system calls whose failures the dispatcher has to judge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Opening the file named after `<`.
    OpenInput,
    /// Duplicating a descriptor onto standard input or output.
    Duplicate,
    /// Creating a child process.
    Fork,
    /// Creating the pipe of a two-stage pipeline.
    Pipe,
    /// Waiting for a foreground child.
    Wait,
    /// Changing a signal disposition.
    Signal,
}

/// Outcome of a failed [`Operation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Ignore the failure and carry on.
    Tolerate,
    /// Report the failure and abandon the current command.
    Skip,
    /// Report the failure and terminate the current process.
    Fatal,
}

/// Which process a check runs in, which decides how a fatal verdict exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Site {
    /// The dispatching process itself.
    Shell,
    /// A forked child that has not replaced its image yet.
    Child,
}

impl Operation {
    /// Decide what a failure of this operation with `errno` means.
    pub fn judge(self, errno: Errno) -> Verdict {
        match self {
            Operation::OpenInput => Verdict::Skip,
            Operation::Wait if matches!(errno, Errno::ECHILD | Errno::EINTR) => Verdict::Tolerate,
            Operation::Wait
            | Operation::Duplicate
            | Operation::Fork
            | Operation::Pipe
            | Operation::Signal => Verdict::Fatal,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Operation::OpenInput => "open",
            Operation::Duplicate => "dup2",
            Operation::Fork => "fork",
            Operation::Pipe => "pipe",
            Operation::Wait => "waitpid",
            Operation::Signal => "signal",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Apply the verdict for `op` to `result`.
///
/// Returns the value on success and `None` for a tolerated or skipped failure.
/// A fatal failure does not return.
pub fn check<T>(site: Site, op: Operation, result: nix::Result<T>) -> Option<T> {
    check_on(site, op, op.as_str(), result)
}

/// Like [`check`], naming `subject` (e.g. a file name) in the report.
pub fn check_on<T>(site: Site, op: Operation, subject: &str, result: nix::Result<T>) -> Option<T> {
    let errno = match result {
        Ok(value) => return Some(value),
        Err(errno) => errno,
    };
    match op.judge(errno) {
        Verdict::Tolerate => {
            log::trace!("{op} failed with {errno}, ignored");
            None
        }
        Verdict::Skip => {
            report(subject, errno.desc());
            None
        }
        Verdict::Fatal => fail(site, subject, errno),
    }
}

/// Like [`check`], for operations whose failures are always fatal.
pub(crate) fn require<T>(site: Site, op: Operation, result: nix::Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(errno) => {
            debug_assert_eq!(op.judge(errno), Verdict::Fatal);
            fail(site, op.as_str(), errno)
        }
    }
}

/// Print `minish: <context>: <message>` on standard error.
pub(crate) fn report(context: &str, message: impl fmt::Display) {
    eprintln!("minish: {context}: {message}");
}

/// Report the failure and terminate the current process with status 1.
pub(crate) fn fail(site: Site, context: &str, errno: Errno) -> ! {
    report(context, errno.desc());
    match site {
        Site::Shell => std::process::exit(1),
        // SAFETY: `_exit` skips the shell's atexit work and stdio flushing,
        // which belong to the parent and must not run twice.
        Site::Child => unsafe { nix::libc::_exit(1) },
    }
}

/// Recover the errno behind an I/O error, for calls made through `std`.
pub(crate) fn errno_of(err: &std::io::Error) -> Errno {
    err.raw_os_error().map_or(Errno::EINVAL, Errno::from_raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_failures_skip_the_command() {
        assert_eq!(Operation::OpenInput.judge(Errno::ENOENT), Verdict::Skip);
        assert_eq!(Operation::OpenInput.judge(Errno::EACCES), Verdict::Skip);
    }

    #[test]
    fn wait_races_are_tolerated() {
        assert_eq!(Operation::Wait.judge(Errno::ECHILD), Verdict::Tolerate);
        assert_eq!(Operation::Wait.judge(Errno::EINTR), Verdict::Tolerate);
        assert_eq!(Operation::Wait.judge(Errno::EINVAL), Verdict::Fatal);
    }

    #[test]
    fn plumbing_and_process_failures_are_fatal() {
        for op in [
            Operation::Duplicate,
            Operation::Fork,
            Operation::Pipe,
            Operation::Signal,
        ] {
            assert_eq!(op.judge(Errno::EMFILE), Verdict::Fatal, "{op}");
            assert_eq!(op.judge(Errno::ECHILD), Verdict::Fatal, "{op}");
        }
    }

    #[test]
    fn check_passes_values_through() {
        assert_eq!(check(Site::Shell, Operation::Pipe, Ok(7)), Some(7));
        assert_eq!(require(Site::Shell, Operation::Fork, Ok("pid")), "pid");
    }

    #[test]
    fn check_returns_none_for_non_fatal_failures() {
        let waited: nix::Result<()> = Err(Errno::ECHILD);
        assert_eq!(check(Site::Shell, Operation::Wait, waited), None);

        let opened: nix::Result<i32> = Err(Errno::ENOENT);
        assert_eq!(
            check_on(Site::Shell, Operation::OpenInput, "missing.txt", opened),
            None
        );
    }

    #[test]
    fn errno_of_io_errors() {
        let missing = std::fs::File::open("/definitely/not/here").unwrap_err();
        assert_eq!(errno_of(&missing), Errno::ENOENT);

        let synthetic = std::io::Error::other("no errno");
        assert_eq!(errno_of(&synthetic), Errno::EINVAL);
    }

    #[test]
    fn operations_display_their_syscall() {
        assert_eq!(Operation::Duplicate.to_string(), "dup2");
        assert_eq!(Operation::Wait.to_string(), "waitpid");
    }
}
