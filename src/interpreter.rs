use crate::command::Command;
use crate::launcher::{self, ExecArgs, Spawned};
use crate::plumbing::{self, Pipe};
use crate::policy::{self, Operation, Site};
use anyhow::{Context, Result};
use nix::sys::wait::waitpid;
use nix::unistd::Pid;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::BufRead;

/// What the read-loop should do after a line has been dispatched.
///
/// Every recognized shape yields [`Status::Continue`], whatever the exit status
/// of the programs it ran. [`Status::Unrecognized`] is only returned for an
/// empty argument vector, which the read-loop never passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Continue,
    Unrecognized,
}

impl Status {
    /// Whether the read-loop should go on reading lines.
    pub fn should_continue(self) -> bool {
        self == Status::Continue
    }
}

/// Whether the shell waits for a simple command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Foreground,
    Background,
}

/// Dispatcher for tokenized command lines.
///
/// An `Interpreter` can only be obtained through [`Interpreter::prepare`], which
/// installs the signal dispositions of the shell process: `SIGINT` is ignored so
/// Ctrl-C only stops the foreground job, and `SIGCHLD` is ignored so finished
/// background jobs are reaped by the kernel. These dispositions are
/// process-wide and stay in place until the process exits.
///
/// Example
/// ```no_run
/// use minish::Interpreter;
/// let mut sh = Interpreter::prepare().unwrap();
/// sh.process_arglist(&["ls", "|", "wc", "-l"]);
/// sh.finalize().unwrap();
/// ```
pub struct Interpreter {
    _prepared: (),
}

impl Interpreter {
    /// Start hook: install the shell's signal dispositions.
    ///
    /// The caller is expected to give up if this fails.
    pub fn prepare() -> Result<Self> {
        launcher::assume_shell_disposition()
            .context("failed to install the shell's signal dispositions")?;
        log::debug!("shell ignores SIGINT and SIGCHLD");
        Ok(Self { _prepared: () })
    }

    /// Run one already-tokenized command line.
    ///
    /// The line is split at its first control token and realized as one child
    /// (bare, background, redirect) or two (pipeline). Foreground children are
    /// waited for before returning; background ones are not. The caller's
    /// vector is only read, never truncated.
    pub fn process_arglist<S: AsRef<str>>(&mut self, args: &[S]) -> Status {
        if args.is_empty() {
            return Status::Unrecognized;
        }
        let command = Command::split(args);
        log::debug!("dispatching {} command", command.name());
        match command {
            Command::Bare(argv) => run_simple(argv, Mode::Foreground),
            Command::Background(argv) => run_simple(argv, Mode::Background),
            Command::Pipeline { producer, consumer } => run_pipeline(producer, consumer),
            Command::Redirect { argv, source } => run_redirect(argv, source),
        }
        Status::Continue
    }

    /// End hook. There is nothing to clean up.
    pub fn finalize(self) -> Result<()> {
        log::debug!("session finished");
        Ok(())
    }

    /// Interactive read-loop on the terminal.
    ///
    /// Ctrl-C at the prompt discards the current line; end of input stops the
    /// loop.
    pub fn repl(&mut self, prompt: &str) -> Result<()> {
        let mut rl = DefaultEditor::new()
            .context("failed to start the line editor")?;

        loop {
            match rl.readline(prompt) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        rl.add_history_entry(line.as_str())?;
                    }
                    if !self.process_line(&line).should_continue() {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(err) => return Err(err).context("failed to read a line"),
            }
        }

        Ok(())
    }

    /// Non-interactive read-loop: dispatch every line of `input`, no prompt.
    ///
    /// `input` is buffered, so when it is the shell's own standard input the
    /// shell may already hold lines that have not run yet. A foreground
    /// child reading standard input (a bare `cat`) does not see those lines
    /// and may get end-of-file right away. Use `<` to feed a command instead.
    pub fn run_lines<R: BufRead>(&mut self, input: R) -> Result<()> {
        for line in input.lines() {
            let line = line.context("failed to read a line")?;
            if !self.process_line(&line).should_continue() {
                break;
            }
        }
        Ok(())
    }

    fn process_line(&mut self, line: &str) -> Status {
        let args = split_line(line);
        if args.is_empty() {
            return Status::Continue;
        }
        self.process_arglist(&args)
    }
}

/// Split a raw line into an argument vector on whitespace.
///
/// There is no quoting: `echo "a b"` yields `["echo", "\"a", "b\""]`.
pub fn split_line(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_owned).collect()
}

/// Convert one side of a line for `execvp`, or report why it cannot run.
fn exec_args<S: AsRef<str>>(args: &[S], shape: &str) -> Option<ExecArgs> {
    ExecArgs::new(args)
        .map_err(|e| policy::report(shape, e))
        .ok()
}

fn run_simple<S: AsRef<str>>(argv: &[S], mode: Mode) {
    let Some(args) = exec_args(argv, "command") else {
        return;
    };
    match launcher::spawn() {
        Spawned::Child => {
            launcher::assume_child_disposition();
            if mode == Mode::Foreground {
                launcher::assume_foreground_disposition();
            }
            launcher::replace_image(&args)
        }
        Spawned::Parent(pid) => match mode {
            Mode::Foreground => wait_for(pid),
            Mode::Background => log::debug!("child {pid} left running in the background"),
        },
    }
}

fn run_pipeline<S: AsRef<str>>(producer: &[S], consumer: &[S]) {
    let Some(producer) = exec_args(producer, "pipeline") else {
        return;
    };
    let Some(consumer) = exec_args(consumer, "pipeline") else {
        return;
    };

    let pipe = Pipe::open();
    let first = match launcher::spawn() {
        Spawned::Child => {
            launcher::assume_child_disposition();
            launcher::assume_foreground_disposition();
            pipe.into_stdout();
            launcher::replace_image(&producer)
        }
        Spawned::Parent(pid) => pid,
    };
    let second = match launcher::spawn() {
        Spawned::Child => {
            launcher::assume_child_disposition();
            launcher::assume_foreground_disposition();
            pipe.into_stdin();
            launcher::replace_image(&consumer)
        }
        Spawned::Parent(pid) => pid,
    };

    // Both children exist before the shell gives up its ends and waits.
    pipe.close();
    wait_for(first);
    wait_for(second);
}

fn run_redirect<S: AsRef<str>>(argv: &[S], source: Option<&S>) {
    let Some(path) = source else {
        policy::report("redirect", "missing file operand");
        return;
    };
    let Some(args) = exec_args(argv, "redirect") else {
        return;
    };
    let Some(input) = plumbing::open_input(path.as_ref()) else {
        return;
    };

    match launcher::spawn() {
        Spawned::Child => {
            plumbing::attach_stdin(input);
            launcher::assume_child_disposition();
            launcher::assume_foreground_disposition();
            launcher::replace_image(&args)
        }
        Spawned::Parent(pid) => {
            drop(input);
            wait_for(pid);
        }
    }
}

/// Block until `pid` terminates. A missing child is expected: the kernel may
/// already have reaped it since `SIGCHLD` is ignored.
fn wait_for(pid: Pid) {
    if let Some(status) = policy::check(Site::Shell, Operation::Wait, waitpid(pid, None)) {
        log::debug!("child {pid} finished: {status:?}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Skips `prepare` so the test harness keeps its own signal dispositions.
    // None of these lines reach a fork.
    fn interpreter() -> Interpreter {
        Interpreter { _prepared: () }
    }

    #[test]
    fn split_line_on_whitespace() {
        assert_eq!(split_line("  ls\t-la   /tmp \n"), ["ls", "-la", "/tmp"]);
        assert_eq!(split_line("echo \"a b\""), ["echo", "\"a", "b\""]);
        assert!(split_line("   ").is_empty());
    }

    #[test]
    fn empty_vector_is_unrecognized() {
        let empty: [&str; 0] = [];
        assert_eq!(interpreter().process_arglist(&empty), Status::Unrecognized);
        assert!(!Status::Unrecognized.should_continue());
    }

    #[test]
    fn missing_redirect_source_skips_command() {
        let args = ["cat", "<", "/definitely/not/here.txt"];
        assert_eq!(interpreter().process_arglist(&args), Status::Continue);
    }

    #[test]
    fn redirect_without_filename_skips_command() {
        assert_eq!(
            interpreter().process_arglist(&["cat", "<"]),
            Status::Continue
        );
    }

    #[test]
    fn pipeline_without_consumer_skips_command() {
        assert_eq!(
            interpreter().process_arglist(&["ls", "|"]),
            Status::Continue
        );
    }

    #[test]
    fn blank_lines_keep_the_loop_going() {
        let mut sh = interpreter();
        assert_eq!(sh.process_line(""), Status::Continue);
        sh.run_lines("\n   \n\t\n".as_bytes()).unwrap();
    }
}
