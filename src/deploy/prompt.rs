//! Interactive replace policy.
//!
//! Asks on stderr, reads the answer from stdin.  Upper-case answers apply the
//! choice to every remaining conflict of the run.
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;

use super::decision::{ReplaceDecision, ReplacePolicy};

/// Replace policy that prompts the user for each conflict.
#[derive(Debug)]
pub struct PromptPolicy<R, W> {
    input: Mutex<R>,
    output: Mutex<W>,
    apply_all: Mutex<Option<ReplaceDecision>>,
}

impl PromptPolicy<io::StdinLock<'static>, io::Stderr> {
    /// Prompt on the process's stderr and read from its stdin.
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> PromptPolicy<R, W> {
    /// Create a policy over arbitrary streams.
    pub const fn new(input: R, output: W) -> Self {
        Self {
            input: Mutex::new(input),
            output: Mutex::new(output),
            apply_all: Mutex::new(None),
        }
    }

    fn prompt_single(
        &self,
        source_modified: SystemTime,
        target: &Path,
        target_modified: SystemTime,
    ) -> ReplaceDecision {
        let mut input = self
            .input
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut output = self
            .output
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        loop {
            // An unwritable prompt aborts, like end of input.
            if show_prompt(&mut *output, source_modified, target, target_modified).is_err() {
                return ReplaceDecision::Abort;
            }

            let mut answer = String::new();
            match input.read_line(&mut answer) {
                Ok(0) | Err(_) => return ReplaceDecision::Abort,
                Ok(_) => {}
            }

            let (decision, all) = match answer.trim() {
                "o" => (ReplaceDecision::Replace, false),
                "s" => (ReplaceDecision::Skip, false),
                "n" => (ReplaceDecision::ReplaceOlder, false),
                "O" => (ReplaceDecision::Replace, true),
                "S" => (ReplaceDecision::Skip, true),
                "N" => (ReplaceDecision::ReplaceOlder, true),
                "a" | "A" => return ReplaceDecision::Abort,
                _ => continue,
            };
            if all {
                *self
                    .apply_all
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(decision);
            }
            return decision;
        }
    }
}

impl<R: BufRead, W: Write> ReplacePolicy for PromptPolicy<R, W> {
    fn decide(
        &self,
        _source: &Path,
        source_modified: SystemTime,
        target: &Path,
        target_modified: SystemTime,
    ) -> ReplaceDecision {
        let remembered = *self
            .apply_all
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(decision) = remembered {
            return decision;
        }
        self.prompt_single(source_modified, target, target_modified)
    }
}

fn show_prompt(
    output: &mut impl Write,
    source_modified: SystemTime,
    target: &Path,
    target_modified: SystemTime,
) -> io::Result<()> {
    writeln!(
        output,
        "\nConflict: {} already exists (source {}, target {})",
        target.display(),
        format_time(source_modified),
        format_time(target_modified),
    )?;
    write!(
        output,
        "[o]verwrite / [s]kip / [n]ewer only / [a]bort (O/S/N = all)? "
    )?;
    output.flush()
}

fn format_time(t: SystemTime) -> String {
    chrono::DateTime::<chrono::Local>::from(t)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn ask(policy: &PromptPolicy<Cursor<&'static [u8]>, Vec<u8>>) -> ReplaceDecision {
        let t = SystemTime::UNIX_EPOCH;
        policy.decide(Path::new("src/a"), t, Path::new("dst/a"), t)
    }

    #[test]
    fn lower_case_answers_apply_once() {
        let policy = PromptPolicy::new(Cursor::new(&b"s\no\n"[..]), Vec::new());
        assert_eq!(ask(&policy), ReplaceDecision::Skip);
        assert_eq!(ask(&policy), ReplaceDecision::Replace);
    }

    #[test]
    fn newer_only_answer() {
        let policy = PromptPolicy::new(Cursor::new(&b"n\n"[..]), Vec::new());
        assert_eq!(ask(&policy), ReplaceDecision::ReplaceOlder);
    }

    #[test]
    fn upper_case_answer_is_remembered() {
        let policy = PromptPolicy::new(Cursor::new(&b"S\n"[..]), Vec::new());
        assert_eq!(ask(&policy), ReplaceDecision::Skip);
        // Input is exhausted; a second prompt would abort.
        assert_eq!(ask(&policy), ReplaceDecision::Skip);
    }

    #[test]
    fn unknown_answer_reprompts() {
        let policy = PromptPolicy::new(Cursor::new(&b"x\n\no\n"[..]), Vec::new());
        assert_eq!(ask(&policy), ReplaceDecision::Replace);
        let out = String::from_utf8(policy.output.into_inner().unwrap()).unwrap();
        assert_eq!(out.matches("Conflict:").count(), 3);
    }

    #[test]
    fn end_of_input_aborts() {
        let policy = PromptPolicy::new(Cursor::new(&b""[..]), Vec::new());
        assert_eq!(ask(&policy), ReplaceDecision::Abort);
    }

    /// Writer whose every write fails, like a closed stderr.
    struct ClosedWriter;

    impl Write for ClosedWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }
    }

    #[test]
    fn unwritable_prompt_aborts_without_reading() {
        let policy = PromptPolicy::new(Cursor::new(&b"o\n"[..]), ClosedWriter);
        let t = SystemTime::UNIX_EPOCH;
        assert_eq!(
            policy.decide(Path::new("src/a"), t, Path::new("dst/a"), t),
            ReplaceDecision::Abort
        );
        assert_eq!(policy.input.into_inner().unwrap().position(), 0);
    }

    #[test]
    fn prompt_names_the_target() {
        let policy = PromptPolicy::new(Cursor::new(&b"a\n"[..]), Vec::new());
        assert_eq!(ask(&policy), ReplaceDecision::Abort);
        let out = String::from_utf8(policy.output.into_inner().unwrap()).unwrap();
        assert!(out.contains("dst/a"), "prompt should name the target: {out}");
    }
}
