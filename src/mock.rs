//! Scripted test doubles for the transport and console boundaries
//!
//! Both doubles are cheap to clone and share their state, so a test keeps one
//! handle for scripting and assertions while the client owns another.
//!
//! ```rust
//! use cirrus::mock::{MockTransport, ScriptedConsole};
//! use cirrus_core_interface::TransportError;
//!
//! let transport = MockTransport::new();
//! transport.push_error(TransportError::ReadTimeout);
//! transport.push_response(200, r#"{"return_value":1}"#);
//!
//! let console = ScriptedConsole::new();
//! console.push_lines(["first line", "second line"]);
//! assert_eq!(transport.call_count(), 0);
//! ```

use async_trait::async_trait;
use cirrus_core_interface::{
    normalize_line, Console, HttpRequest, HttpResponse, Transport, TransportError,
};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

type Scripted = Result<HttpResponse, TransportError>;

#[derive(Debug, Default)]
struct TransportState {
    queue: VecDeque<Scripted>,
    by_path: HashMap<String, VecDeque<Scripted>>,
    fallback: Option<Scripted>,
    requests: Vec<HttpRequest>,
    delay: Option<Duration>,
}

/// In-memory [`Transport`] answering from scripted queues
///
/// A request is answered from the queue registered for the last segment of
/// its URL path if that queue is non-empty, otherwise from the shared queue,
/// otherwise from the fallback. With nothing scripted the request fails with
/// [`TransportError::Connect`].
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<TransportState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, TransportState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push_response(&self, status: u16, body: &str) {
        self.state()
            .queue
            .push_back(Ok(HttpResponse::new(status, body)));
    }

    pub fn push_error(&self, error: TransportError) {
        self.state().queue.push_back(Err(error));
    }

    /// Script an answer for requests whose last path segment is `segment`
    pub fn push_for(&self, segment: &str, answer: Scripted) {
        self.state()
            .by_path
            .entry(segment.to_string())
            .or_default()
            .push_back(answer);
    }

    /// Answer given once every queue is empty
    pub fn set_fallback(&self, status: u16, body: &str) {
        self.state().fallback = Some(Ok(HttpResponse::new(status, body)));
    }

    /// Hold every answer back by `delay`
    pub fn set_delay(&self, delay: Duration) {
        self.state().delay = Some(delay);
    }

    /// Requests received so far, oldest first
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.state().requests.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state().requests.len()
    }

    fn answer(&self, request: HttpRequest) -> (Scripted, Option<Duration>) {
        let mut guard = self.state();
        let state = &mut *guard;
        let segment = request
            .url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or_default()
            .to_string();
        state.requests.push(request);

        let scripted = state
            .by_path
            .get_mut(&segment)
            .and_then(VecDeque::pop_front);
        let answer = match scripted {
            Some(answer) => answer,
            None => state
                .queue
                .pop_front()
                .or_else(|| state.fallback.clone())
                .unwrap_or_else(|| Err(TransportError::Connect("no scripted response".into()))),
        };
        (answer, state.delay)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let (answer, delay) = self.answer(request);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        answer
    }
}

#[derive(Debug, Default)]
struct ConsoleState {
    lines: VecDeque<String>,
    confirms: VecDeque<bool>,
    prompts: Vec<String>,
    output: Vec<String>,
}

/// [`Console`] fed from scripted lines and answers
///
/// Reads past the end of the script fail with
/// [`io::ErrorKind::UnexpectedEof`], like a closed terminal.
#[derive(Debug, Clone, Default)]
pub struct ScriptedConsole {
    state: Arc<Mutex<ConsoleState>>,
}

impl ScriptedConsole {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ConsoleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue raw input lines (secrets and plain lines share the queue)
    pub fn push_lines<I, S>(&self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state()
            .lines
            .extend(lines.into_iter().map(Into::into));
    }

    pub fn push_confirm(&self, answer: bool) {
        self.state().confirms.push_back(answer);
    }

    /// Prompts shown so far, confirmations included
    pub fn prompts(&self) -> Vec<String> {
        self.state().prompts.clone()
    }

    /// Lines printed so far
    pub fn output(&self) -> Vec<String> {
        self.state().output.clone()
    }

    fn next_line(&self, prompt: &str, max_len: usize) -> io::Result<String> {
        let mut state = self.state();
        state.prompts.push(prompt.to_string());
        state
            .lines
            .pop_front()
            .map(|raw| normalize_line(&raw, max_len))
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "console input closed"))
    }
}

impl Console for ScriptedConsole {
    fn read_line(&self, prompt: &str, max_len: usize) -> io::Result<String> {
        self.next_line(prompt, max_len)
    }

    fn read_secret(&self, prompt: &str, max_len: usize) -> io::Result<String> {
        self.next_line(prompt, max_len)
    }

    fn confirm(&self, prompt: &str) -> io::Result<bool> {
        let mut state = self.state();
        state.prompts.push(prompt.to_string());
        state
            .confirms
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "console input closed"))
    }

    fn println(&self, line: &str) {
        self.state().output.push(line.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cirrus_core_interface::Method;

    fn request(leaf: &str) -> HttpRequest {
        let url = format!("https://api.particle.io/v1/devices/abc/{}", leaf)
            .parse()
            .unwrap();
        HttpRequest::new(Method::Get, url, "token")
    }

    #[tokio::test]
    async fn test_path_queue_takes_precedence() {
        let transport = MockTransport::new();
        transport.push_response(200, "shared");
        transport.push_for("led", Ok(HttpResponse::new(200, "led")));

        assert_eq!(transport.send(request("led")).await.unwrap().body, "led");
        assert_eq!(transport.send(request("led")).await.unwrap().body, "shared");
        assert!(transport.send(request("led")).await.is_err());
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test]
    async fn test_fallback_repeats() {
        let transport = MockTransport::new();
        transport.set_fallback(404, "{}");
        for _ in 0..3 {
            assert_eq!(transport.send(request("x")).await.unwrap().status, 404);
        }
    }

    #[test]
    fn test_console_script_and_eof() {
        let console = ScriptedConsole::new();
        console.push_lines(["first\r\n"]);
        console.push_confirm(true);

        assert_eq!(console.read_line("name", 64).unwrap(), "first");
        assert!(console.confirm("sure?").unwrap());
        let err = console.read_line("again", 64).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert_eq!(console.prompts(), vec!["name", "sure?", "again"]);
    }
}
