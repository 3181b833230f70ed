//! wa-reply-agent: multi-tenant, multilingual WhatsApp reply assistant with Hexagonal Architecture.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod shared;
pub mod usecases;
