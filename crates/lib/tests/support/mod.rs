//! Scripted in-memory target for driving builds in tests.
//!
//! Records every raw command line (and any stdin payload) the engine sends,
//! and answers each one from a set of substring-matched rules. Unmatched
//! commands succeed with empty output, so only the interesting responses
//! need scripting.

use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bedrock::{ExecCommand, ExitStatus, OutputStream, Target, TransportError};

/// Canned answer for one command invocation.
#[derive(Debug, Clone, Default)]
pub struct FakeResponse {
    pub exit: i32,
    pub stdout: String,
    pub stderr: String,
    pub transport_failure: bool,
}

impl FakeResponse {
    pub fn exit(code: i32) -> Self {
        Self {
            exit: code,
            ..Self::default()
        }
    }

    pub fn with_stdout(mut self, stdout: impl Into<String>) -> Self {
        self.stdout = stdout.into();
        self
    }

    pub fn with_stderr(mut self, stderr: impl Into<String>) -> Self {
        self.stderr = stderr.into();
        self
    }

    pub fn transport_failure() -> Self {
        Self {
            transport_failure: true,
            ..Self::default()
        }
    }
}

/// One command the engine sent, with whatever it piped to stdin.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub raw: String,
    pub stdin: Option<String>,
}

struct Rule {
    needle: String,
    responses: VecDeque<FakeResponse>,
}

#[derive(Default)]
struct FakeState {
    calls: Mutex<Vec<RecordedCall>>,
    rules: Mutex<Vec<Rule>>,
    resets: AtomicUsize,
}

/// A target that never touches a real machine.
///
/// Clones share state, so tests keep one handle for assertions after the
/// build takes ownership of another.
#[derive(Clone)]
pub struct FakeTarget {
    user: String,
    hostname: Option<String>,
    state: Arc<FakeState>,
}

impl FakeTarget {
    pub fn new(user: &str) -> Self {
        Self {
            user: user.to_string(),
            hostname: Some("fake.example.com".to_string()),
            state: Arc::default(),
        }
    }

    /// A target that offers no hostname.
    pub fn anonymous(user: &str) -> Self {
        Self {
            hostname: None,
            ..Self::new(user)
        }
    }

    /// Queue a response for commands containing `needle`. Responses for the
    /// same needle are consumed in order; the last one repeats.
    pub fn respond(&self, needle: &str, response: FakeResponse) {
        let mut rules = self.state.rules.lock().unwrap();
        if let Some(rule) = rules.iter_mut().find(|rule| rule.needle == needle) {
            rule.responses.push_back(response);
        } else {
            rules.push(Rule {
                needle: needle.to_string(),
                responses: VecDeque::from([response]),
            });
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.calls.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.calls().into_iter().map(|call| call.raw).collect()
    }

    /// Number of recorded commands containing `needle`.
    pub fn sent(&self, needle: &str) -> usize {
        self.commands().iter().filter(|raw| raw.contains(needle)).count()
    }

    /// Stdin piped to the first recorded command containing `needle`.
    pub fn stdin_of(&self, needle: &str) -> Option<String> {
        self
            .calls()
            .into_iter()
            .find(|call| call.raw.contains(needle))
            .and_then(|call| call.stdin)
    }

    pub fn resets(&self) -> usize {
        self.state.resets.load(Ordering::SeqCst)
    }

    fn resolve(&self, raw: &str) -> FakeResponse {
        let mut rules = self.state.rules.lock().unwrap();
        for rule in rules.iter_mut() {
            if raw.contains(&rule.needle) {
                return if rule.responses.len() > 1 {
                    rule.responses.pop_front().unwrap_or_default()
                } else {
                    rule.responses.front().cloned().unwrap_or_default()
                };
            }
        }
        FakeResponse::default()
    }
}

#[async_trait]
impl Target for FakeTarget {
    fn user(&self) -> &str {
        &self.user
    }

    fn command(&self, raw: &str) -> Result<Box<dyn ExecCommand>, TransportError> {
        let response = self.resolve(raw);
        let index = {
            let mut calls = self.state.calls.lock().unwrap();
            calls.push(RecordedCall {
                raw: raw.to_string(),
                stdin: None,
            });
            calls.len() - 1
        };
        Ok(Box::new(FakeExec {
            state: self.state.clone(),
            index,
            stdout: Some(response.stdout.clone().into_bytes()),
            stderr: Some(response.stderr.clone().into_bytes()),
            response,
            started: false,
        }))
    }

    async fn reset(&mut self) -> Result<(), TransportError> {
        self.state.resets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn hostname(&self) -> Option<String> {
        self.hostname.clone()
    }
}

struct FakeExec {
    state: Arc<FakeState>,
    index: usize,
    stdout: Option<Vec<u8>>,
    stderr: Option<Vec<u8>>,
    response: FakeResponse,
    started: bool,
}

#[async_trait]
impl ExecCommand for FakeExec {
    fn set_stdin(&mut self, input: Vec<u8>) {
        let mut calls = self.state.calls.lock().unwrap();
        calls[self.index].stdin = Some(String::from_utf8_lossy(&input).into_owned());
    }

    fn take_stdout(&mut self) -> Option<OutputStream> {
        if !self.started {
            return None;
        }
        let bytes = self.stdout.take()?;
        Some(Box::new(Cursor::new(bytes)))
    }

    fn take_stderr(&mut self) -> Option<OutputStream> {
        if !self.started {
            return None;
        }
        let bytes = self.stderr.take()?;
        Some(Box::new(Cursor::new(bytes)))
    }

    async fn start(&mut self) -> Result<(), TransportError> {
        if self.response.transport_failure {
            return Err(TransportError::Session("injected transport failure".to_string()));
        }
        self.started = true;
        Ok(())
    }

    async fn wait(&mut self) -> Result<ExitStatus, TransportError> {
        if !self.started {
            return Err(TransportError::NotStarted);
        }
        Ok(ExitStatus::new(Some(self.response.exit)))
    }
}
