//! Operator console on the controlling terminal

use cirrus_core_interface::{normalize_line, Console};
use console::style;
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Password};
use std::io;
use std::sync::Arc;

fn into_io(err: dialoguer::Error) -> io::Error {
    match err {
        dialoguer::Error::IO(e) => e,
    }
}

/// [`Console`] backed by dialoguer prompts
#[derive(Default)]
pub struct TerminalConsole {
    theme: ColorfulTheme,
}

impl TerminalConsole {
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Debug for TerminalConsole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TerminalConsole")
    }
}

impl Console for TerminalConsole {
    fn read_line(&self, prompt: &str, max_len: usize) -> io::Result<String> {
        let raw: String = Input::with_theme(&self.theme)
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()
            .map_err(into_io)?;
        Ok(normalize_line(&raw, max_len))
    }

    fn read_secret(&self, prompt: &str, max_len: usize) -> io::Result<String> {
        let raw = Password::with_theme(&self.theme)
            .with_prompt(prompt)
            .allow_empty_password(true)
            .interact()
            .map_err(into_io)?;
        Ok(normalize_line(&raw, max_len))
    }

    fn confirm(&self, prompt: &str) -> io::Result<bool> {
        Confirm::with_theme(&self.theme)
            .with_prompt(prompt)
            .default(false)
            .interact()
            .map_err(into_io)
    }

    fn println(&self, line: &str) {
        println!("{}", line);
    }
}

/// Highlight a heading the way the operator commands print them
pub fn heading(text: &str) -> String {
    style(text).cyan().bold().to_string()
}

/// Run a blocking console interaction off the async workers
pub(crate) async fn with_console<T, F>(console: &Arc<dyn Console>, f: F) -> io::Result<T>
where
    F: FnOnce(&dyn Console) -> io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let console = Arc::clone(console);
    tokio::task::spawn_blocking(move || f(console.as_ref()))
        .await
        .map_err(io::Error::other)?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_errors_keep_their_kind() {
        let err = into_io(dialoguer::Error::IO(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "terminal closed",
        )));
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
