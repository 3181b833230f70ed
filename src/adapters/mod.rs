//! Infrastructure adapters. Implement outbound ports.
//!
//! Language model, embeddings, search, SQLite, WhatsApp and the operator TUI. Map errors to DomainError.

pub mod ai;
pub mod documents;
pub mod persistence;
pub mod search;
pub mod ui;
pub mod whatsapp;
