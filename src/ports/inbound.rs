//! Inbound port. UI (adapter) calls into the application.

use crate::domain::DomainError;

/// Input port: operator CLI invokes application use cases.
#[async_trait::async_trait]
pub trait InputPort: Send + Sync {
    /// Run the interactive menu until the operator exits.
    async fn run(&self) -> Result<(), DomainError>;
}
