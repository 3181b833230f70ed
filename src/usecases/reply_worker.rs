//! Async reply pipeline: inbound messages are recorded, queued on a bounded
//! mpsc channel and answered by a worker with a concurrency cap.
//!
//! Producer side ([`ReplyQueue`]) blocks on `send().await` when the channel is
//! full (backpressure). Consumer side ([`ReplyWorker`]) resolves the tenant,
//! generates the reply with retries, sends it and stores the outcome.

use crate::adapters::whatsapp::parse_webhook;
use crate::domain::{DomainError, InboundMessage, ReplyOutcome};
use crate::ports::{MessageStorePort, MessengerPort, TenantPort};
use crate::usecases::ReplyOrchestrator;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// One queued message, already recorded in the message store.
#[derive(Debug, Clone)]
pub struct ReplyJob {
    pub message_id: i64,
    pub message: InboundMessage,
}

/// Exponential backoff for failed generations: `base_delay * 2^attempt`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after `attempt` (0-based) failed.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.min(16)))
    }
}

/// Producer handle. Cheap to clone.
#[derive(Clone)]
pub struct ReplyQueue {
    tx: mpsc::Sender<ReplyJob>,
    tenants: Arc<dyn TenantPort>,
    messages: Arc<dyn MessageStorePort>,
}

impl ReplyQueue {
    pub fn new(
        tx: mpsc::Sender<ReplyJob>,
        tenants: Arc<dyn TenantPort>,
        messages: Arc<dyn MessageStorePort>,
    ) -> Self {
        Self {
            tx,
            tenants,
            messages,
        }
    }

    /// Record the message (status `received`) and queue it. Returns the message id.
    pub async fn submit(&self, message: InboundMessage) -> Result<i64, DomainError> {
        let message_id = self.messages.record_inbound(&message).await?;
        let job = ReplyJob {
            message_id,
            message,
        };
        if self.tx.send(job).await.is_err() {
            let reason = "reply worker stopped";
            warn!(message_id, "{}, message not queued", reason);
            if let Err(e) = self.messages.mark_failed(message_id, reason).await {
                error!(message_id, error = %e, "could not mark unqueued message as failed");
            }
            return Err(DomainError::QueueClosed(reason.to_string()));
        }
        debug!(message_id, "reply job queued");
        Ok(message_id)
    }

    /// Queue every customer message of a WhatsApp webhook payload.
    ///
    /// Messages addressed to a phone-number id no tenant owns are skipped.
    pub async fn submit_webhook(&self, payload: &serde_json::Value) -> Result<Vec<i64>, DomainError> {
        let mut ids = Vec::new();
        for wm in parse_webhook(payload) {
            let Some(phone_id) = wm.phone_number_id.as_deref() else {
                warn!(message_id = %wm.message_id, "webhook message without phone number id");
                continue;
            };
            let Some(profile) = self.tenants.find_by_phone_id(phone_id).await? else {
                warn!(phone_id, "no tenant for WhatsApp number, message skipped");
                continue;
            };
            ids.push(self.submit(wm.to_inbound(profile.tenant_id)).await?);
        }
        Ok(ids)
    }
}

/// Shared state of the spawned reply tasks.
struct ReplyHandler {
    orchestrator: Arc<ReplyOrchestrator>,
    tenants: Arc<dyn TenantPort>,
    messages: Arc<dyn MessageStorePort>,
    messenger: Arc<dyn MessengerPort>,
    retry: RetryPolicy,
}

/// Reply worker. Consumes the channel until every sender is dropped.
pub struct ReplyWorker {
    orchestrator: Arc<ReplyOrchestrator>,
    tenants: Arc<dyn TenantPort>,
    messages: Arc<dyn MessageStorePort>,
    messenger: Arc<dyn MessengerPort>,
    rx: mpsc::Receiver<ReplyJob>,
    retry: RetryPolicy,
    max_concurrent: usize,
}

impl ReplyWorker {
    pub fn new(
        orchestrator: Arc<ReplyOrchestrator>,
        tenants: Arc<dyn TenantPort>,
        messages: Arc<dyn MessageStorePort>,
        messenger: Arc<dyn MessengerPort>,
        rx: mpsc::Receiver<ReplyJob>,
    ) -> Self {
        Self {
            orchestrator,
            tenants,
            messages,
            messenger,
            rx,
            retry: RetryPolicy::default(),
            max_concurrent: 4,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n.max(1);
        self
    }

    /// Run until the channel is closed and every in-flight reply has finished.
    pub async fn run(self) {
        let Self {
            orchestrator,
            tenants,
            messages,
            messenger,
            mut rx,
            retry,
            max_concurrent,
        } = self;
        let handler = Arc::new(ReplyHandler {
            orchestrator,
            tenants,
            messages,
            messenger,
            retry,
        });
        let semaphore = Arc::new(Semaphore::new(max_concurrent));
        let mut tasks = JoinSet::new();

        while let Some(job) = rx.recv().await {
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            let handler = Arc::clone(&handler);
            tasks.spawn(async move {
                let _permit = permit;
                handler.handle(job).await;
            });
            while tasks.try_join_next().is_some() {}
        }

        while tasks.join_next().await.is_some() {}
        info!("reply worker finished (channel closed)");
    }
}

impl ReplyHandler {
    async fn handle(&self, job: ReplyJob) {
        match self.process(&job).await {
            Ok(outcome) => info!(
                message_id = job.message_id,
                tenant_id = job.message.tenant_id,
                intent = outcome.intent.label(),
                confidence = outcome.confidence,
                elapsed_ms = outcome.elapsed_ms,
                degradations = outcome.degradations.len(),
                "reply sent"
            ),
            Err(e) => {
                error!(message_id = job.message_id, tenant_id = job.message.tenant_id, error = %e, "reply failed");
                if let Err(store_err) = self.messages.mark_failed(job.message_id, &e.to_string()).await {
                    warn!(message_id = job.message_id, error = %store_err, "could not mark message failed");
                }
            }
        }
    }

    async fn process(&self, job: &ReplyJob) -> Result<ReplyOutcome, DomainError> {
        let tenant_id = job.message.tenant_id;
        let profile = self
            .tenants
            .get_profile(tenant_id)
            .await?
            .ok_or_else(|| DomainError::TenantNotFound(tenant_id.to_string()))?;
        self.messages.mark_processing(job.message_id).await?;

        let outcome = self.generate_with_retry(job, &profile).await?;
        self.messenger
            .send_text(
                profile.whatsapp_phone_id.as_deref(),
                &job.message.sender,
                &outcome.text,
            )
            .await?;
        self.messages.save_outcome(job.message_id, &outcome).await?;
        Ok(outcome)
    }

    async fn generate_with_retry(
        &self,
        job: &ReplyJob,
        profile: &crate::domain::TenantProfile,
    ) -> Result<ReplyOutcome, DomainError> {
        let mut attempt = 0u32;
        loop {
            match self
                .orchestrator
                .generate_reply(&job.message, profile)
                .await
            {
                Ok(outcome) => return Ok(outcome),
                Err(e) if e.is_retryable() && attempt + 1 < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        message_id = job.message_id,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "generation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
