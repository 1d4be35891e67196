//! Keypress input for the `clean` confirmation when stdin is a terminal.

use std::io::{self, Write};

use bff::confirm::{Key, KeySource};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;

/// Reads single keypresses in raw mode. Raw mode ends on drop.
pub struct TerminalKeys {
    _raw: RawMode,
}

impl TerminalKeys {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            _raw: RawMode::enable()?,
        })
    }
}

impl KeySource for TerminalKeys {
    fn next_key(&mut self) -> io::Result<Key> {
        loop {
            let Event::Key(KeyEvent {
                code,
                modifiers,
                kind: KeyEventKind::Press,
                ..
            }) = event::read()?
            else {
                continue;
            };

            let ctrl = modifiers.contains(KeyModifiers::CONTROL);
            return Ok(match code {
                KeyCode::Esc => Key::Escape,
                // raw mode swallows SIGINT
                KeyCode::Char('c') if ctrl => Key::Escape,
                KeyCode::Char('d') if ctrl => Key::End,
                KeyCode::Char(c) if !ctrl => Key::Char(c),
                KeyCode::Enter => Key::Enter,
                KeyCode::Backspace => Key::Backspace,
                _ => continue,
            });
        }
    }

    fn echoes(&self) -> bool {
        true
    }
}

struct RawMode;

impl RawMode {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            tracing::warn!(error = %e, "failed to restore terminal mode");
        }
    }
}

/// Raw mode does not return the carriage on `\n`.
pub struct CrLf<W>(pub W);

impl<W: Write> Write for CrLf<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for chunk in buf.split_inclusive(|&b| b == b'\n') {
            match chunk.strip_suffix(b"\n") {
                Some(line) => {
                    self.0.write_all(line)?;
                    self.0.write_all(b"\r\n")?;
                }
                None => self.0.write_all(chunk)?,
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crlf_returns_the_carriage() {
        let mut out = CrLf(Vec::new());
        write!(out, "does not match.\nProject name: ").unwrap();
        writeln!(out).unwrap();
        assert_eq!(out.0, b"does not match.\r\nProject name: \r\n");
    }
}
