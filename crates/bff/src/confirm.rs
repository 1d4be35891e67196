//! Typed confirmation for destructive commands.
//!
//! The user must enter the project name exactly. `q` or `x` (any case) as
//! the whole answer aborts, and so does an escape keypress the moment it
//! arrives. Any other answer is a [`ConfirmationMismatch`] and the prompt
//! repeats.

use std::io::{self, BufRead, Write};

pub const ESCAPE: char = '\u{1b}';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Proceed,
    Abort,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{input:?} does not match the project name")]
pub struct ConfirmationMismatch {
    pub input: String,
}

pub fn evaluate(input: &str, expected: &str) -> Result<Decision, ConfirmationMismatch> {
    if input.contains(ESCAPE) {
        return Ok(Decision::Abort);
    }

    let answer = input.trim();
    if answer.eq_ignore_ascii_case("q") || answer.eq_ignore_ascii_case("x") {
        return Ok(Decision::Abort);
    }
    if answer == expected {
        return Ok(Decision::Proceed);
    }

    Err(ConfirmationMismatch {
        input: answer.to_owned(),
    })
}

// ── Keys ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Backspace,
    Enter,
    Escape,
    /// Input closed.
    End,
}

/// Where the confirmation prompt reads keypresses from.
pub trait KeySource {
    fn next_key(&mut self) -> io::Result<Key>;

    /// True when typed characters must be echoed by the prompt, as with a
    /// terminal in raw mode.
    fn echoes(&self) -> bool {
        false
    }
}

/// Keys decoded from a byte stream, for pipes and tests.
pub struct ReadKeys<R> {
    input: R,
}

impl<R: BufRead> ReadKeys<R> {
    pub fn new(input: R) -> Self {
        Self { input }
    }

    fn next_byte(&mut self) -> io::Result<Option<u8>> {
        let buf = self.input.fill_buf()?;
        let Some(&byte) = buf.first() else {
            return Ok(None);
        };
        self.input.consume(1);
        Ok(Some(byte))
    }
}

impl<R: BufRead> KeySource for ReadKeys<R> {
    fn next_key(&mut self) -> io::Result<Key> {
        let Some(first) = self.next_byte()? else {
            return Ok(Key::End);
        };
        let width = match first {
            b'\n' => return Ok(Key::Enter),
            0x1b => return Ok(Key::Escape),
            0x08 | 0x7f => return Ok(Key::Backspace),
            b if b < 0x80 => return Ok(Key::Char(char::from(b))),
            b if b >= 0xf0 => 4,
            b if b >= 0xe0 => 3,
            _ => 2,
        };

        let mut bytes = vec![first];
        for _ in 1..width {
            match self.next_byte()? {
                Some(b) => bytes.push(b),
                None => break,
            }
        }
        let c = std::str::from_utf8(&bytes)
            .ok()
            .and_then(|s| s.chars().next())
            .unwrap_or(char::REPLACEMENT_CHARACTER);
        Ok(Key::Char(c))
    }
}

// ── Prompts ──

/// Prompt on `output` until `keys` yields a decision. End of input aborts.
pub fn prompt_for_name<K: KeySource, W: Write>(
    keys: &mut K,
    mut output: W,
    expected: &str,
) -> io::Result<Decision> {
    loop {
        write!(output, "Project name: ")?;
        output.flush()?;

        let Some(line) = read_line(keys, &mut output)? else {
            writeln!(output)?;
            return Ok(Decision::Abort);
        };

        match evaluate(&line, expected) {
            Ok(decision) => return Ok(decision),
            Err(mismatch) => {
                tracing::debug!(input = %mismatch.input, "confirmation mismatch");
                writeln!(output, "{mismatch}. Try again, or type 'q' or 'x' to abort.")?;
            }
        }
    }
}

/// One line of keys. An escape comes back as a line holding [`ESCAPE`]
/// without waiting for Enter; `None` means the input ended.
fn read_line<K: KeySource, W: Write>(keys: &mut K, output: &mut W) -> io::Result<Option<String>> {
    let echo = keys.echoes();
    let mut line = String::new();
    loop {
        match keys.next_key()? {
            Key::Char('\r') => {}
            Key::Char(c) => {
                line.push(c);
                if echo {
                    write!(output, "{c}")?;
                    output.flush()?;
                }
            }
            Key::Backspace => {
                if line.pop().is_some() && echo {
                    write!(output, "\u{8} \u{8}")?;
                    output.flush()?;
                }
            }
            Key::Enter => {
                if echo {
                    writeln!(output)?;
                }
                return Ok(Some(line));
            }
            Key::Escape => {
                if echo {
                    writeln!(output)?;
                }
                return Ok(Some(ESCAPE.to_string()));
            }
            Key::End if line.is_empty() => return Ok(None),
            Key::End => return Ok(Some(line)),
        }
    }
}

/// Ask a `yes/N` question. Only `yes` (any case) counts as consent.
pub fn ask_yes<R: BufRead, W: Write>(
    mut input: R,
    mut output: W,
    question: &str,
) -> io::Result<bool> {
    write!(output, "{question} (yes/N): ")?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(!line.contains(ESCAPE) && line.trim().eq_ignore_ascii_case("yes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_name_proceeds() {
        assert_eq!(evaluate("demo-app\n", "demo-app"), Ok(Decision::Proceed));
    }

    #[test]
    fn quit_letters_abort_in_any_case() {
        for input in ["q", "Q", "x", "X\n", "  q  "] {
            assert_eq!(evaluate(input, "demo-app"), Ok(Decision::Abort), "{input:?}");
        }
    }

    #[test]
    fn escape_anywhere_aborts() {
        assert_eq!(evaluate("demo\u{1b}-app", "demo-app"), Ok(Decision::Abort));
        assert_eq!(evaluate("demo-app\u{1b}", "demo-app"), Ok(Decision::Abort));
    }

    #[test]
    fn quit_letter_inside_text_is_a_mismatch() {
        assert!(evaluate("quit", "demo-app").is_err());
        assert!(evaluate("xq", "demo-app").is_err());
    }

    #[test]
    fn near_miss_is_a_mismatch() {
        let err = evaluate("Demo-App", "demo-app").unwrap_err();
        assert_eq!(err.input, "Demo-App");
    }

    fn keys(input: &[u8]) -> ReadKeys<&[u8]> {
        ReadKeys::new(input)
    }

    /// Keys replayed from a list, reporting End once it runs out.
    struct Scripted {
        keys: std::vec::IntoIter<Key>,
        echo: bool,
    }

    impl KeySource for Scripted {
        fn next_key(&mut self) -> io::Result<Key> {
            Ok(self.keys.next().unwrap_or(Key::End))
        }

        fn echoes(&self) -> bool {
            self.echo
        }
    }

    fn typed(text: &str) -> Vec<Key> {
        text.chars().map(Key::Char).collect()
    }

    #[test]
    fn prompt_repeats_until_match() {
        let mut output = Vec::new();
        let decision =
            prompt_for_name(&mut keys(b"demo\ndemo-ap\ndemo-app\n"), &mut output, "demo-app")
                .unwrap();

        assert_eq!(decision, Decision::Proceed);
        let shown = String::from_utf8(output).unwrap();
        assert_eq!(shown.matches("Project name: ").count(), 3);
        assert_eq!(shown.matches("does not match").count(), 2);
    }

    #[test]
    fn prompt_aborts_on_quit_after_mismatch() {
        let decision =
            prompt_for_name(&mut keys(b"nope\nx\ndemo-app\n"), Vec::new(), "demo-app").unwrap();
        assert_eq!(decision, Decision::Abort);
    }

    #[test]
    fn prompt_aborts_at_end_of_input() {
        let decision = prompt_for_name(&mut keys(b"nope\n"), Vec::new(), "demo-app").unwrap();
        assert_eq!(decision, Decision::Abort);
    }

    #[test]
    fn escape_aborts_without_enter() {
        let mut script = typed("demo");
        script.push(Key::Escape);
        // never reached: the prompt must not wait for the rest of the line
        script.extend(typed("-app"));
        script.push(Key::Enter);
        let mut source = Scripted {
            keys: script.into_iter(),
            echo: false,
        };

        let decision = prompt_for_name(&mut source, Vec::new(), "demo-app").unwrap();
        assert_eq!(decision, Decision::Abort);
        assert_eq!(source.keys.next(), Some(Key::Char('-')));
    }

    #[test]
    fn backspace_edits_and_echoes() {
        let mut script = typed("demo-apq");
        script.push(Key::Backspace);
        script.push(Key::Char('p'));
        script.push(Key::Enter);
        let mut source = Scripted {
            keys: script.into_iter(),
            echo: true,
        };
        let mut output = Vec::new();

        let decision = prompt_for_name(&mut source, &mut output, "demo-app").unwrap();
        assert_eq!(decision, Decision::Proceed);
        let shown = String::from_utf8(output).unwrap();
        assert!(shown.contains("demo-apq\u{8} \u{8}p"));
    }

    #[test]
    fn piped_escape_byte_aborts() {
        let decision = prompt_for_name(&mut keys(b"demo\x1b"), Vec::new(), "demo-app").unwrap();
        assert_eq!(decision, Decision::Abort);
    }

    #[test]
    fn multibyte_input_is_decoded() {
        let mut source = keys("déjà\n".as_bytes());
        let mut line = Vec::new();
        loop {
            match source.next_key().unwrap() {
                Key::Char(c) => line.push(c),
                _ => break,
            }
        }
        assert_eq!(line.into_iter().collect::<String>(), "déjà");
    }

    #[test]
    fn ask_yes_requires_full_word() {
        assert!(ask_yes(&b"YES\n"[..], Vec::new(), "Delete?").unwrap());
        assert!(!ask_yes(&b"y\n"[..], Vec::new(), "Delete?").unwrap());
        assert!(!ask_yes(&b""[..], Vec::new(), "Delete?").unwrap());
    }
}
