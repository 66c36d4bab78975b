//! Terminal implementations of the store's user-facing collaborators.

use std::io::{self, BufRead, Write};
use std::sync::Mutex;

use session_store::{Confirm, Confirmation, ErrorReporter};

/// Prints reports to stderr and mirrors them into the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReporter;

impl ErrorReporter for ConsoleReporter {
    fn report(&self, text: &str, param: Option<&str>) {
        match param {
            Some(param) => {
                tracing::error!(param, "{text}");
                eprintln!("termstore: {text}\n{param}");
            }
            None => {
                tracing::error!("{text}");
                eprintln!("termstore: {text}");
            }
        }
    }
}

/// `y`/`yes`, `n`/`no` and `c`/`cancel`, case-insensitive.
#[must_use]
pub fn parse_answer(line: &str) -> Option<Confirmation> {
    match line.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Some(Confirmation::Affirm),
        "n" | "no" => Some(Confirmation::Decline),
        "c" | "cancel" => Some(Confirmation::Cancel),
        _ => None,
    }
}

/// Asks on a writer and reads the answer from a line source. Input that
/// ends before a valid answer counts as cancel.
pub struct PromptConfirm<R, W> {
    io: Mutex<(R, W)>,
}

impl PromptConfirm<io::BufReader<io::Stdin>, io::Stderr> {
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(io::BufReader::new(io::stdin()), io::stderr())
    }
}

impl<R: BufRead, W: Write> PromptConfirm<R, W> {
    #[must_use]
    pub fn new(input: R, output: W) -> Self {
        Self {
            io: Mutex::new((input, output)),
        }
    }

    fn ask(input: &mut R, output: &mut W, prompt: &str) -> io::Result<Confirmation> {
        writeln!(output, "{prompt}")?;
        let mut line = String::new();
        loop {
            write!(output, "[y/n/c] ")?;
            output.flush()?;
            line.clear();
            if input.read_line(&mut line)? == 0 {
                return Ok(Confirmation::Cancel);
            }
            if let Some(answer) = parse_answer(&line) {
                return Ok(answer);
            }
        }
    }
}

impl<R, W> Confirm for PromptConfirm<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    fn confirm(&self, prompt: &str) -> Confirmation {
        let mut guard = match self.io.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let (input, output) = &mut *guard;
        Self::ask(input, output, prompt).unwrap_or_else(|error| {
            tracing::warn!(%error, "prompt failed; treating as cancel");
            Confirmation::Cancel
        })
    }
}
