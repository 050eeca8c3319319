use crate::policy::{self, Operation, Site};
use nix::sys::signal::{SigHandler, Signal, signal};
use nix::unistd::{ForkResult, Pid, execvp, fork};
use std::ffi::{CString, NulError};
use std::fmt;

/// Arguments of one program, already converted for `execvp`.
///
/// Built in the shell before forking, so a child only has to hand the
/// prepared pointers to the kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExecArgs {
    argv: Vec<CString>,
}

/// Why an argument list cannot be executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ArgvError {
    /// Nothing to run, e.g. the right-hand side of `ls |`.
    Empty,
    /// A token contains a NUL byte and cannot be passed to `execvp`.
    InteriorNul(NulError),
}

impl fmt::Display for ArgvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgvError::Empty => f.write_str("missing command"),
            ArgvError::InteriorNul(e) => write!(f, "invalid argument: {e}"),
        }
    }
}

impl std::error::Error for ArgvError {}

impl ExecArgs {
    pub(crate) fn new<S: AsRef<str>>(args: &[S]) -> Result<Self, ArgvError> {
        if args.is_empty() {
            return Err(ArgvError::Empty);
        }
        let argv = args
            .iter()
            .map(|arg| CString::new(arg.as_ref()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(ArgvError::InteriorNul)?;
        Ok(Self { argv })
    }

    /// Name of the program, looked up in `PATH` by `execvp`.
    pub(crate) fn program(&self) -> &CString {
        &self.argv[0]
    }
}

/// What `spawn` returned in the current process.
pub(crate) enum Spawned {
    /// We are the shell; the child has this pid.
    Parent(Pid),
    /// We are the freshly created child.
    Child,
}

/// Create a child process. Failing to do so terminates the shell.
pub(crate) fn spawn() -> Spawned {
    // SAFETY: the dispatcher is single-threaded, and children only touch
    // descriptors and signal dispositions before `execvp` or `_exit`.
    let forked = unsafe { fork() };
    match policy::require(Site::Shell, Operation::Fork, forked) {
        ForkResult::Parent { child } => {
            log::debug!("forked child {child}");
            Spawned::Parent(child)
        }
        ForkResult::Child => Spawned::Child,
    }
}

/// Install the shell's own dispositions: ignore `SIGINT` so Ctrl-C only reaches
/// the foreground job, and ignore `SIGCHLD` so exited children are reaped by the
/// kernel without a wait.
pub(crate) fn assume_shell_disposition() -> nix::Result<()> {
    set_disposition(Signal::SIGINT, SigHandler::SigIgn)?;
    set_disposition(Signal::SIGCHLD, SigHandler::SigIgn)?;
    Ok(())
}

/// Reset the dispositions every exec'ing child needs, background ones included.
///
/// An ignored signal stays ignored across `execvp`. `SIGCHLD` must be default so
/// the new program can wait for its own children, and `SIGPIPE` must be default
/// because the Rust runtime ignores it at startup.
pub(crate) fn assume_child_disposition() {
    let reset = set_disposition(Signal::SIGCHLD, SigHandler::SigDfl)
        .and_then(|()| set_disposition(Signal::SIGPIPE, SigHandler::SigDfl));
    policy::require(Site::Child, Operation::Signal, reset);
}

/// Restore default `SIGINT` handling in a foreground child so Ctrl-C stops it.
pub(crate) fn assume_foreground_disposition() {
    let reset = set_disposition(Signal::SIGINT, SigHandler::SigDfl);
    policy::require(Site::Child, Operation::Signal, reset);
}

fn set_disposition(sig: Signal, handler: SigHandler) -> nix::Result<()> {
    // SAFETY: only `SigIgn` and `SigDfl` are ever installed, no handler code runs.
    unsafe { signal(sig, handler) }.map(drop)
}

/// Replace the child's image with the program in `args`.
///
/// Never returns: if `execvp` fails, the error is reported and the child exits
/// with status 1 instead of running the shell's code a second time.
pub(crate) fn replace_image(args: &ExecArgs) -> ! {
    let e = match execvp(args.program(), &args.argv) {
        Ok(never) => match never {},
        Err(e) => e,
    };
    policy::fail(Site::Child, &args.program().to_string_lossy(), e)
}
