//! Terminal stand-ins for the browser surfaces.

use std::io::{BufRead, Write};

use arbor_core::{
    auth::Navigator,
    notify::{AverageBoard, MemoryBoard, Notifier, Toast, ToastLevel},
    tree::Confirm,
};

/// Prints toasts to stderr, one per line.
#[derive(Debug, Default)]
pub struct TerminalNotifier;

pub fn format_toast(toast: &Toast) -> String {
    let marker = match toast.level {
        ToastLevel::Info => "i",
        ToastLevel::Success => "+",
        ToastLevel::Warning => "!",
        ToastLevel::Error => "x",
    };
    format!("[{}] {}: {}", marker, toast.title, toast.message)
}

impl Notifier for TerminalNotifier {
    fn notify(&self, toast: Toast) {
        eprintln!("{}", format_toast(&toast));
    }
}

/// Asks on stderr and reads the answer from stdin.
#[derive(Debug, Default)]
pub struct StdinConfirm;

pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        eprint!("{} [y/N] ", prompt);
        if std::io::stderr().flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        match std::io::stdin().lock().read_line(&mut answer) {
            Ok(_) => is_yes(&answer),
            Err(err) => {
                tracing::warn!(%err, "could not read confirmation");
                false
            }
        }
    }
}

/// There are no pages to go to; the target is only reported.
#[derive(Debug, Default)]
pub struct PrintNavigator;

impl Navigator for PrintNavigator {
    fn redirect(&self, target: &str) {
        tracing::info!(target, "continue at");
        eprintln!("-> {}", target);
    }
}

/// Board that prints every accepted update to stdout.
#[derive(Debug, Default)]
pub struct PrintBoard {
    inner: MemoryBoard,
}

impl PrintBoard {
    pub fn with_columns<'a>(columns: impl IntoIterator<Item = &'a str>) -> Self {
        PrintBoard {
            inner: MemoryBoard::with_columns(columns),
        }
    }
}

impl AverageBoard for PrintBoard {
    fn update(&mut self, element_id: &str, text: &str) -> bool {
        let known = self.inner.update(element_id, text);
        if known {
            println!("{} = {}", element_id, text);
        }
        known
    }
}
