use crate::policy::{self, Operation, Site};
use nix::unistd::dup2;
use std::fs::File;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};

const STDIN: RawFd = 0;
const STDOUT: RawFd = 1;

/// Both ends of an anonymous pipe.
///
/// Each end is closed when dropped. Every process holding a `Pipe` has to get
/// rid of the end it does not use: a write end left open anywhere keeps the
/// reader from ever seeing end-of-file.
pub(crate) struct Pipe {
    read: OwnedFd,
    write: OwnedFd,
}

impl Pipe {
    /// Create a pipe in the shell. Failure is fatal.
    pub(crate) fn open() -> Self {
        let (read, write) = policy::require(Site::Shell, Operation::Pipe, nix::unistd::pipe());
        log::trace!("pipe read={} write={}", read.as_raw_fd(), write.as_raw_fd());
        Self { read, write }
    }

    /// Producer side: standard output becomes the write end, and both
    /// original descriptors are closed.
    pub(crate) fn into_stdout(self) {
        let Pipe { read, write } = self;
        drop(read);
        attach(write, STDOUT);
    }

    /// Consumer side: standard input becomes the read end, and both
    /// original descriptors are closed.
    pub(crate) fn into_stdin(self) {
        let Pipe { read, write } = self;
        drop(write);
        attach(read, STDIN);
    }

    /// Shell side: close both ends once every child holds its own copies.
    pub(crate) fn close(self) {
        drop(self);
    }
}

/// Open the redirect source read-only, in the shell, before any fork.
///
/// Returns `None` after reporting the error if the file cannot be opened; the
/// command is then skipped.
pub(crate) fn open_input(path: &str) -> Option<OwnedFd> {
    let opened = File::open(path)
        .map(OwnedFd::from)
        .map_err(|e| policy::errno_of(&e));
    policy::check_on(Site::Shell, Operation::OpenInput, path, opened)
}

/// Child side of a redirect: standard input becomes `source`, whose own
/// descriptor is then closed.
pub(crate) fn attach_stdin(source: OwnedFd) {
    attach(source, STDIN);
}

/// Duplicate `fd` onto `target`, then close `fd`. Failure ends the child.
fn attach(fd: OwnedFd, target: RawFd) {
    policy::require(
        Site::Child,
        Operation::Duplicate,
        dup2(fd.as_raw_fd(), target),
    );
    // dup2 onto itself is a no-op; dropping `fd` would then close `target`.
    if fd.as_raw_fd() == target {
        std::mem::forget(fd);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    #[test]
    fn pipe_ends_are_distinct() {
        let pipe = Pipe::open();
        assert_ne!(pipe.read.as_raw_fd(), pipe.write.as_raw_fd());
    }

    #[test]
    fn pipe_carries_bytes_and_reports_eof_once_writer_closes() {
        let Pipe { read, write } = Pipe::open();
        let mut writer = File::from(write);
        let mut reader = File::from(read);
        writer.write_all(b"hello").unwrap();
        drop(writer);

        let mut received = String::new();
        reader.read_to_string(&mut received).unwrap();
        assert_eq!(received, "hello");
    }

    #[test]
    fn open_input_reads_existing_file() {
        let name = format!("plumbing_tests_{}", std::process::id());
        let path = std::env::temp_dir().join(name);
        std::fs::write(&path, "contents\n").unwrap();

        let name = path.to_str().unwrap();
        let fd = open_input(name).expect("file should open");
        let mut text = String::new();
        File::from(fd).read_to_string(&mut text).unwrap();
        assert_eq!(text, "contents\n");

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn open_input_skips_missing_file() {
        assert!(open_input("/definitely/not/here.txt").is_none());
    }
}
