//! Document files: loading knowledge sources and CSV export of the message log.

pub mod csv_export;
pub mod loader;

pub use csv_export::{export_messages, messages_to_csv};
pub use loader::load_text;
