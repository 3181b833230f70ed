//! WhatsApp Business (Cloud API) adapter: webhook mapping and outbound messages.

pub mod client;
pub mod mapper;

pub use client::{LogMessenger, WhatsAppClient};
pub use mapper::{WebhookMessage, parse_webhook};
