//! User interaction
//!
//! Operations that need a yes/no decision (overwriting a duplicate upload,
//! dropping a file that can no longer be decoded) ask a [`Confirm`]
//! implementation instead of reading a console directly. Shard transfers
//! are reported through a [`Progress`] sink.

use parking_lot::Mutex;
use std::io::{BufRead, Write};
use tracing::debug;

/// Invalid answers tolerated before the default is taken
pub const MAX_PROMPT_ATTEMPTS: usize = 3;

/// Yes/no decision capability
pub trait Confirm: Send + Sync {
    fn confirm(&self, question: &str, default: bool) -> bool;
}

/// Always gives the same answer
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

impl Confirm for FixedAnswer {
    fn confirm(&self, question: &str, _default: bool) -> bool {
        debug!(question, answer = self.0, "Answered without prompting");
        self.0
    }
}

/// Interactive prompt over an injected reader and writer
///
/// Re-asks on invalid input at most [`MAX_PROMPT_ATTEMPTS`] times, then
/// falls back to the default. End of input and I/O errors also yield the
/// default.
pub struct Prompt<R, W> {
    io: Mutex<(R, W)>,
}

impl<R, W> Prompt<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            io: Mutex::new((reader, writer)),
        }
    }
}

fn parse_answer(line: &str, default: bool) -> Option<bool> {
    match line.trim().to_ascii_lowercase().as_str() {
        "" => Some(default),
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

impl<R, W> Confirm for Prompt<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    fn confirm(&self, question: &str, default: bool) -> bool {
        let mut io = self.io.lock();
        let (reader, writer) = &mut *io;
        let hint = if default { "[Y/n]" } else { "[y/N]" };

        for _ in 0..MAX_PROMPT_ATTEMPTS {
            if write!(writer, "{} {} ", question, hint)
                .and_then(|_| writer.flush())
                .is_err()
            {
                return default;
            }

            let mut line = String::new();
            match reader.read_line(&mut line) {
                Ok(0) | Err(_) => return default,
                Ok(_) => {}
            }

            match parse_answer(&line, default) {
                Some(answer) => return answer,
                None => {
                    let _ = writeln!(writer, "Invalid input, please answer y or n.");
                }
            }
        }

        let _ = writeln!(writer, "No valid answer, using default.");
        default
    }
}

/// Per-shard progress of one upload or download
pub trait Progress: Send + Sync {
    /// A transfer of `shards` shards of `file` begins
    fn start(&self, file: &str, shards: usize);

    /// One shard was transferred or given up on
    fn shard_done(&self, shard: &str);

    fn finish(&self);
}

/// Discards progress events
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn start(&self, _file: &str, _shards: usize) {}
    fn shard_done(&self, _shard: &str) {}
    fn finish(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn ask(input: &str, default: bool) -> (bool, String) {
        let prompt = Prompt::new(Cursor::new(input.as_bytes().to_vec()), Vec::new());
        let answer = prompt.confirm("Overwrite?", default);
        let (_, out) = prompt.io.into_inner();
        (answer, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_yes_and_no() {
        assert!(ask("y\n", false).0);
        assert!(ask("YES\n", false).0);
        assert!(!ask("n\n", true).0);
    }

    #[test]
    fn test_empty_line_takes_default() {
        assert!(ask("\n", true).0);
        assert!(!ask("\n", false).0);
    }

    #[test]
    fn test_reprompts_then_accepts() {
        let (answer, out) = ask("maybe\ny\n", false);
        assert!(answer);
        assert_eq!(out.matches("Overwrite?").count(), 2);
        assert!(out.contains("Invalid input"));
    }

    #[test]
    fn test_invalid_input_is_bounded() {
        let input = "x\n".repeat(1000);
        let (answer, out) = ask(&input, true);
        assert!(answer);
        assert_eq!(out.matches("Overwrite?").count(), MAX_PROMPT_ATTEMPTS);
    }

    #[test]
    fn test_eof_takes_default() {
        assert!(!ask("", false).0);
    }

    #[test]
    fn test_fixed_answer() {
        assert!(FixedAnswer(true).confirm("q", false));
        assert!(!FixedAnswer(false).confirm("q", true));
    }
}
