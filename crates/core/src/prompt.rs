#[cfg(any(test, feature = "mock"))]
use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

/// Operator terminal: text out, one line of input back.
pub trait Prompt {
    fn say(&mut self, line: &str);

    /// Shows `message` and blocks for a line; `Ok(None)` once input is closed.
    /// The returned line has its line terminator removed and nothing else.
    fn ask(&mut self, message: &str) -> io::Result<Option<String>>;
}

/// stdin / stdout.
#[derive(Debug, Default)]
pub struct TerminalPrompt;

impl Prompt for TerminalPrompt {
    fn say(&mut self, line: &str) {
        println!("{}", line);
    }

    fn ask(&mut self, message: &str) -> io::Result<Option<String>> {
        let mut stdout = io::stdout();
        write!(stdout, "{}", message)?;
        stdout.flush()?;
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(strip_line_ending(&line).to_string()))
    }
}

pub fn strip_line_ending(line: &str) -> &str {
    line.strip_suffix('\n')
        .map(|rest| rest.strip_suffix('\r').unwrap_or(rest))
        .unwrap_or(line)
}

/// Canned answers for tests; records everything shown.
#[cfg(any(test, feature = "mock"))]
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    answers: VecDeque<String>,
    pub transcript: Vec<String>,
    pub asked: usize,
}

#[cfg(any(test, feature = "mock"))]
impl ScriptedPrompt {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            transcript: Vec::new(),
            asked: 0,
        }
    }

    pub fn saw(&self, needle: &str) -> bool {
        self.transcript.iter().any(|line| line.contains(needle))
    }
}

#[cfg(any(test, feature = "mock"))]
impl Prompt for ScriptedPrompt {
    fn say(&mut self, line: &str) {
        self.transcript.push(line.to_string());
    }

    fn ask(&mut self, message: &str) -> io::Result<Option<String>> {
        self.asked += 1;
        self.transcript.push(message.to_string());
        Ok(self.answers.pop_front())
    }
}
