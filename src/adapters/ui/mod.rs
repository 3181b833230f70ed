pub mod progress;
pub mod tui;

/// Prints the welcome line and applies the theme for all subsequent inquire prompts.
/// Call once at startup (e.g. in main after tracing init).
pub fn init_ui() {
    println!(
        "wa-reply-agent v{} :: multilingual WhatsApp reply assistant\n",
        env!("CARGO_PKG_VERSION")
    );
    tui::apply_theme();
}
