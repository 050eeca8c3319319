use anyhow::{Context, Result};
use argh::FromArgs;
use minish::Interpreter;
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use std::fs::File;
use std::io::{BufReader, IsTerminal};
use std::path::PathBuf;

#[derive(FromArgs)]
/// Run command lines one at a time: `cmd`, `cmd &`, `cmd | cmd` or `cmd < file`.
struct Args {
    /// prompt printed before each line when reading from a terminal
    #[argh(option, default = "String::from(\"$ \")")]
    prompt: String,

    /// log dispatch decisions and child processes to standard error
    #[argh(switch, short = 'v')]
    verbose: bool,

    /// read command lines from this file instead of standard input
    #[argh(positional)]
    script: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args: Args = argh::from_env();

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    TermLogger::init(
        level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )
    .context("failed to initialize logging")?;

    let mut sh = Interpreter::prepare()?;
    match args.script {
        Some(path) => {
            let file = File::open(&path)
                .with_context(|| format!("cannot open script {}", path.display()))?;
            sh.run_lines(BufReader::new(file))?;
        }
        None if std::io::stdin().is_terminal() => sh.repl(&args.prompt)?,
        None => sh.run_lines(std::io::stdin().lock())?,
    }
    sh.finalize()
}
