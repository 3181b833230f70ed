//! Terminal spinners for long-running operator actions.

use indicatif::{ProgressBar, ProgressStyle};
use std::future::Future;
use std::time::Duration;

pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed}]")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ");
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Await `fut` behind a spinner; the spinner is cleared when it completes.
pub async fn with_spinner<F: Future>(message: &str, fut: F) -> F::Output {
    let pb = spinner(message);
    let out = fut.await;
    pb.finish_and_clear();
    out
}
