//! A tiny command dispatcher for already-tokenized command lines.
//!
//! Each line is realized as one or two child processes created with `fork`
//! and `execvp`. Exactly four shapes are understood, each selected by a single
//! control token appearing anywhere after the command name:
//!
//! - `cmd args...` runs in the foreground and the caller waits for it;
//! - `cmd args... &` runs in the background and the caller does not wait;
//! - `left... | right...` connects two commands through an anonymous pipe;
//! - `cmd args... < file` replaces the command's standard input with `file`.
//!
//! The first control token wins; everything after a `&` is ignored and only one
//! filename is read after `<`. There is no quoting, no escaping and no way to
//! combine shapes.
//!
//! The main entry point is [`Interpreter`]. Its lifecycle is explicit:
//! [`Interpreter::prepare`] installs the shell's own signal dispositions,
//! [`Interpreter::process_arglist`] dispatches one line, and
//! [`Interpreter::finalize`] closes the session.

pub mod command;
mod interpreter;
mod launcher;
mod plumbing;
pub mod policy;

/// Just a convenient re-export of the dispatcher and its return status.
///
/// See [`Interpreter`] for the high-level API.
pub use interpreter::{Interpreter, Status, split_line};
