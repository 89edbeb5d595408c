//! Interactive operator console boundary

use std::io;

/// Blocking, line-oriented operator I/O
///
/// Reads block until a newline arrives. Carriage returns are dropped and
/// anything past `max_len` bytes is silently discarded (see
/// [`normalize_line`]). End of input is reported as
/// [`io::ErrorKind::UnexpectedEof`].
pub trait Console: Send + Sync {
    fn read_line(&self, prompt: &str, max_len: usize) -> io::Result<String>;

    /// Like `read_line`, without echoing what the operator types
    fn read_secret(&self, prompt: &str, max_len: usize) -> io::Result<String>;

    fn confirm(&self, prompt: &str) -> io::Result<bool>;

    fn println(&self, line: &str);
}

/// Apply the console line rules to raw input
///
/// Stops at the first `\n`, drops every `\r`, and keeps at most `max_len`
/// bytes without splitting a UTF-8 character.
pub fn normalize_line(raw: &str, max_len: usize) -> String {
    let line = raw.split('\n').next().unwrap_or_default();
    let mut out = String::with_capacity(line.len().min(max_len));
    for ch in line.chars().filter(|c| *c != '\r') {
        if out.len() + ch.len_utf8() > max_len {
            break;
        }
        out.push(ch);
    }
    out
}
