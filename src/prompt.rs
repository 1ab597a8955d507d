use std::io::{BufRead, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use colored::Colorize;

use crate::error::{Result, TallyError};
use crate::interrupt::CancelToken;

/// How long a blocked read waits before re-checking the cancel token.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub trait LineSource {
    /// Next line of input without its terminator. `Cancelled` once the
    /// token fires, `InputTerminated` when the input is exhausted.
    fn read_line(&mut self, cancel: &CancelToken) -> Result<String>;
}

/// Stdin served from a reader thread, so a blocked read can be abandoned.
pub struct StdinLines {
    rx: Receiver<std::io::Result<String>>,
}

impl StdinLines {
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
        Self { rx }
    }
}

impl LineSource for StdinLines {
    fn read_line(&mut self, cancel: &CancelToken) -> Result<String> {
        loop {
            cancel.check()?;
            match self.rx.recv_timeout(POLL_INTERVAL) {
                Ok(line) => return Ok(line?),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Err(TallyError::InputTerminated),
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct MenuOption<T> {
    pub key: String,
    pub label: String,
    pub value: T,
}

impl<T> MenuOption<T> {
    pub fn new(key: impl Into<String>, label: impl Into<String>, value: T) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            value,
        }
    }
}

pub fn parse_choice<T: Clone>(input: &str, options: &[MenuOption<T>]) -> Result<T> {
    let input = input.trim();
    options
        .iter()
        .find(|o| o.key.eq_ignore_ascii_case(input))
        .map(|o| o.value.clone())
        .ok_or_else(|| TallyError::InvalidChoice(input.to_string()))
}

/// Line-oriented terminal: a details panel, an enumerated menu, an input line.
pub struct Terminal {
    input: Box<dyn LineSource>,
    out: Box<dyn Write>,
    cancel: CancelToken,
}

impl Terminal {
    pub fn new(input: Box<dyn LineSource>, out: Box<dyn Write>, cancel: CancelToken) -> Self {
        Self { input, out, cancel }
    }

    pub fn stdio(cancel: CancelToken) -> Self {
        Self::new(
            Box::new(StdinLines::spawn()),
            Box::new(std::io::stdout()),
            cancel,
        )
    }

    /// Output is best-effort; a broken stream never aborts the session.
    pub fn say(&mut self, text: impl AsRef<str>) {
        let _ = writeln!(self.out, "{}", text.as_ref());
    }

    pub fn ask(&mut self, prompt: &str) -> Result<String> {
        let _ = write!(self.out, "{prompt} > ");
        let _ = self.out.flush();
        self.cancel.check()?;
        let line = self.input.read_line(&self.cancel)?;
        Ok(line.trim().to_string())
    }

    pub fn reject(&mut self, input: &str) {
        let msg = format!("Invalid choice '{input}', please try again.");
        self.say(msg.red().to_string());
    }

    pub fn choose<T: Clone>(&mut self, title: &str, options: &[MenuOption<T>]) -> Result<T> {
        self.say(title);
        for opt in options {
            self.say(format!("  [{}] {}", opt.key, opt.label));
        }
        loop {
            let input = self.ask("Choice")?;
            match parse_choice(&input, options) {
                Ok(value) => return Ok(value),
                Err(TallyError::InvalidChoice(bad)) => self.reject(&bad),
                Err(e) => return Err(e),
            }
        }
    }
}
