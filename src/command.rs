/// Literal token that sends a command to the background.
pub const BACKGROUND_TOKEN: &str = "&";
/// Literal token that connects two commands with a pipe.
pub const PIPE_TOKEN: &str = "|";
/// Literal token that redirects standard input from a file.
pub const REDIRECT_TOKEN: &str = "<";

/// Shape of a command line, together with the index of its control token.
///
/// Produced by [`CommandShape::classify`] and consumed right away by the
/// dispatcher. A [`CommandShape::Bare`] line has no control token, which is
/// reported as index 0 by [`CommandShape::token_index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandShape {
    /// No control token: run in the foreground.
    Bare,
    /// `&` at the given index.
    Background(usize),
    /// `|` at the given index.
    Pipeline(usize),
    /// `<` at the given index.
    Redirect(usize),
}

impl CommandShape {
    /// Find the first control token in `args`.
    ///
    /// Scanning starts at index 1: the command name is never a control token,
    /// so `& foo` is a bare command named `&`. The first token exactly equal to
    /// `&`, `|` or `<` decides the shape; later ones are ordinary arguments of
    /// whichever side they end up on (or are dropped, for `&` and `<`).
    pub fn classify<S: AsRef<str>>(args: &[S]) -> Self {
        args.iter()
            .enumerate()
            .skip(1)
            .find_map(|(index, token)| match token.as_ref() {
                BACKGROUND_TOKEN => Some(CommandShape::Background(index)),
                PIPE_TOKEN => Some(CommandShape::Pipeline(index)),
                REDIRECT_TOKEN => Some(CommandShape::Redirect(index)),
                _ => None,
            })
            .unwrap_or(CommandShape::Bare)
    }

    /// Index of the control token, or 0 for [`CommandShape::Bare`].
    pub fn token_index(self) -> usize {
        match self {
            CommandShape::Bare => 0,
            CommandShape::Background(index)
            | CommandShape::Pipeline(index)
            | CommandShape::Redirect(index) => index,
        }
    }
}

/// A command line split at its control token.
///
/// Every variant borrows the caller's argument vector; the views never overlap
/// and never include the control token itself, so each side can be handed to
/// `execvp` as is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a, S> {
    Bare(&'a [S]),
    Background(&'a [S]),
    Pipeline {
        /// Arguments before `|`; its standard output feeds the pipe.
        producer: &'a [S],
        /// Arguments strictly after `|`; its standard input drains the pipe.
        consumer: &'a [S],
    },
    Redirect {
        /// Arguments before `<`.
        argv: &'a [S],
        /// The token right after `<`, if the line has one.
        source: Option<&'a S>,
    },
}

impl<'a, S: AsRef<str>> Command<'a, S> {
    /// Classify `args` and split it into the argument lists of each process.
    pub fn split(args: &'a [S]) -> Self {
        Self::from_shape(CommandShape::classify(args), args)
    }

    fn from_shape(shape: CommandShape, args: &'a [S]) -> Self {
        match shape {
            CommandShape::Bare => Command::Bare(args),
            CommandShape::Background(index) => Command::Background(&args[..index]),
            CommandShape::Pipeline(index) => Command::Pipeline {
                producer: &args[..index],
                consumer: &args[index + 1..],
            },
            CommandShape::Redirect(index) => Command::Redirect {
                argv: &args[..index],
                source: args.get(index + 1),
            },
        }
    }

    /// The shape this command was split from, without the token index.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Bare(_) => "bare",
            Command::Background(_) => "background",
            Command::Pipeline { .. } => "pipeline",
            Command::Redirect { .. } => "redirect",
        }
    }
}
