//! Implements InputPort. Inquire-based operator menu.
//!
//! Lets an operator register tenants, load knowledge, try replies, replay
//! webhook deliveries and export the message log.

use crate::adapters::documents::{export_messages, load_text};
use crate::adapters::ui::progress::with_spinner;
use crate::domain::{
    DomainError, InboundMessage, Language, ReplyOutcome, StoredMessage, TenantProfile,
};
use crate::ports::{InputPort, MessageStorePort, TenantPort};
use crate::usecases::{KnowledgeService, ReplyOrchestrator, ReplyQueue};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use inquire::error::InquireError;
use inquire::ui::{Color, RenderConfig, StyleSheet, Styled};
use inquire::{Confirm, MultiSelect, Select, Text};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Messages included in a CSV export.
const EXPORT_LIMIT: u32 = 10_000;
const RECENT_LIMIT: u32 = 10;
const CLI_SENDER: &str = "operator-cli";

const MENU_TEST: &str = "Send a test message";
const MENU_INGEST: &str = "Ingest a knowledge file";
const MENU_REGISTER: &str = "Register or edit a tenant";
const MENU_REPLAY: &str = "Replay a WhatsApp webhook file";
const MENU_RECENT: &str = "Show recent replies";
const MENU_EXPORT: &str = "Export message log to CSV";
const MENU_EXIT: &str = "Exit";

/// Green/cyan theme for every inquire prompt.
pub fn apply_theme() {
    let mut cfg = RenderConfig::default_colored();
    cfg.prompt_prefix = Styled::new("?").with_fg(Color::LightGreen);
    cfg.highlighted_option_prefix = Styled::new("›").with_fg(Color::LightCyan);
    cfg.selected_checkbox = Styled::new("[x]").with_fg(Color::LightGreen);
    cfg.answer = StyleSheet::new().with_fg(Color::LightCyan);
    inquire::set_global_render_config(cfg);
}

fn prompt_err(e: InquireError) -> DomainError {
    DomainError::InputInvalid(e.to_string())
}

fn is_cancel(e: &InquireError) -> bool {
    matches!(
        e,
        InquireError::OperationCanceled | InquireError::OperationInterrupted
    )
}

pub(crate) fn tenant_label(p: &TenantProfile) -> String {
    format!("#{} {}", p.tenant_id, p.name)
}

/// Comma-separated list, blanks dropped.
pub(crate) fn parse_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

pub(crate) fn format_outcome(o: &ReplyOutcome) -> String {
    let mut out = format!(
        "{}\n\n  language: {} -> {}  intent: {}  confidence: {}%\n  web search: {}  translated: {}  time: {} ms",
        o.text,
        o.detected_language,
        o.target_language,
        o.intent.label(),
        o.confidence,
        if o.used_web_search { "yes" } else { "no" },
        if o.translated { "yes" } else { "no" },
        o.elapsed_ms
    );
    for d in &o.degradations {
        out.push_str(&format!("\n  degraded: {:?}", d));
    }
    out
}

pub(crate) fn format_stored(m: &StoredMessage) -> String {
    let when = DateTime::<Utc>::from_timestamp(m.received_at, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| m.received_at.to_string());
    let detail = match (&m.reply, &m.error) {
        (Some(reply), _) => format!("→ {}", reply),
        (None, Some(err)) => format!("✗ {}", err),
        (None, None) => "…".to_string(),
    };
    format!(
        "[{}] {} {}: {}\n    {}",
        m.status.as_str(),
        when,
        m.sender,
        m.text,
        detail
    )
}

/// TUI adapter. Inquire prompts.
pub struct TuiInputPort {
    tenants: Arc<dyn TenantPort>,
    messages: Arc<dyn MessageStorePort>,
    orchestrator: Arc<ReplyOrchestrator>,
    knowledge: Arc<KnowledgeService>,
    queue: ReplyQueue,
    export_dir: PathBuf,
}

impl TuiInputPort {
    pub fn new(
        tenants: Arc<dyn TenantPort>,
        messages: Arc<dyn MessageStorePort>,
        orchestrator: Arc<ReplyOrchestrator>,
        knowledge: Arc<KnowledgeService>,
        queue: ReplyQueue,
        export_dir: PathBuf,
    ) -> Self {
        Self {
            tenants,
            messages,
            orchestrator,
            knowledge,
            queue,
            export_dir,
        }
    }

    async fn pick_tenant(&self) -> Result<Option<TenantProfile>, DomainError> {
        let mut profiles = self.tenants.list_profiles().await?;
        if profiles.is_empty() {
            println!("No tenants yet. Register one first.");
            return Ok(None);
        }
        let labels: Vec<String> = profiles.iter().map(tenant_label).collect();
        let choice = Select::new("Tenant", labels.clone())
            .prompt()
            .map_err(prompt_err)?;
        let idx = labels.iter().position(|l| *l == choice).unwrap_or(0);
        Ok(Some(profiles.swap_remove(idx)))
    }

    async fn send_test_message(&self) -> Result<(), DomainError> {
        let Some(profile) = self.pick_tenant().await? else {
            return Ok(());
        };
        let text = Text::new("Customer message:").prompt().map_err(prompt_err)?;
        let message = InboundMessage::new(profile.tenant_id, CLI_SENDER, text);
        let message_id = self.messages.record_inbound(&message).await?;
        self.messages.mark_processing(message_id).await?;

        let result = with_spinner(
            "Generating reply...",
            self.orchestrator.generate_reply(&message, &profile),
        )
        .await;
        match result {
            Ok(outcome) => {
                self.messages.save_outcome(message_id, &outcome).await?;
                println!("\n{}\n", format_outcome(&outcome));
            }
            Err(e) => {
                self.messages.mark_failed(message_id, &e.to_string()).await?;
                println!("Reply failed: {}", e);
            }
        }
        Ok(())
    }

    async fn ingest_file(&self) -> Result<(), DomainError> {
        let Some(profile) = self.pick_tenant().await? else {
            return Ok(());
        };
        let path = Text::new("File path (.txt, .md, .csv):")
            .prompt()
            .map_err(prompt_err)?;
        let path = PathBuf::from(path.trim());
        let default_source = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("document")
            .to_string();
        let source = Text::new("Source name:")
            .with_default(&default_source)
            .prompt()
            .map_err(prompt_err)?;

        let text = load_text(&path).await?;
        let chunks = with_spinner(
            "Embedding document...",
            self.knowledge
                .ingest_document(profile.tenant_id, &source, &text),
        )
        .await?;
        println!("Stored {} chunks for '{}'.", chunks, source);
        Ok(())
    }

    async fn register_tenant(&self) -> Result<(), DomainError> {
        let existing = self.tenants.list_profiles().await?;
        let mut options = vec!["(new tenant)".to_string()];
        options.extend(existing.iter().map(tenant_label));
        let choice = Select::new("Tenant to register or edit", options)
            .prompt()
            .map_err(prompt_err)?;
        let base = existing
            .into_iter()
            .find(|p| tenant_label(p) == choice)
            .unwrap_or_else(|| TenantProfile {
                tenant_id: 0,
                name: String::new(),
                description: String::new(),
                persona: "Friendly and concise customer service assistant".to_string(),
                supported_languages: vec![Language::En, Language::Si, Language::Ta],
                default_language: Language::En,
                knowledge_sources: Vec::new(),
                whatsapp_phone_id: None,
            });

        let name = Text::new("Business name:")
            .with_default(&base.name)
            .prompt()
            .map_err(prompt_err)?;
        let description = Text::new("Description:")
            .with_default(&base.description)
            .prompt()
            .map_err(prompt_err)?;
        let persona = Text::new("Assistant persona:")
            .with_default(&base.persona)
            .prompt()
            .map_err(prompt_err)?;

        let all = vec![Language::En, Language::Si, Language::Ta];
        let defaults: Vec<usize> = all
            .iter()
            .enumerate()
            .filter(|(_, l)| base.supported_languages.contains(l))
            .map(|(i, _)| i)
            .collect();
        let mut supported = MultiSelect::new("Supported languages", all.clone())
            .with_default(&defaults)
            .prompt()
            .map_err(prompt_err)?;
        if supported.is_empty() {
            supported.push(Language::En);
        }
        let default_language = Select::new("Default reply language", supported.clone())
            .prompt()
            .map_err(prompt_err)?;

        let phone = Text::new("WhatsApp phone number id (blank for none):")
            .with_default(base.whatsapp_phone_id.as_deref().unwrap_or(""))
            .prompt()
            .map_err(prompt_err)?;
        let sources = Text::new("Knowledge sources (comma-separated, blank = all):")
            .with_default(&base.knowledge_sources.join(", "))
            .prompt()
            .map_err(prompt_err)?;

        let profile = TenantProfile {
            tenant_id: base.tenant_id,
            name: name.trim().to_string(),
            description: description.trim().to_string(),
            persona: persona.trim().to_string(),
            supported_languages: supported,
            default_language,
            knowledge_sources: parse_list(&sources),
            whatsapp_phone_id: Some(phone.trim().to_string()).filter(|p| !p.is_empty()),
        };
        if profile.name.is_empty() {
            println!("Business name is required.");
            return Ok(());
        }
        let id = self.tenants.upsert_profile(&profile).await?;
        info!(tenant_id = id, "tenant saved from CLI");
        println!("Saved tenant #{}.", id);
        Ok(())
    }

    async fn replay_webhook(&self) -> Result<(), DomainError> {
        let path = Text::new("Webhook JSON file:").prompt().map_err(prompt_err)?;
        let raw = tokio::fs::read_to_string(path.trim())
            .await
            .map_err(|e| DomainError::Document(e.to_string()))?;
        let payload: serde_json::Value =
            serde_json::from_str(&raw).map_err(|e| DomainError::InputInvalid(e.to_string()))?;
        let ids = self.queue.submit_webhook(&payload).await?;
        if ids.is_empty() {
            println!("No customer messages for a registered tenant in that payload.");
        } else {
            println!(
                "Queued {} message(s): {:?}. Check recent replies for results.",
                ids.len(),
                ids
            );
        }
        Ok(())
    }

    async fn show_recent(&self) -> Result<(), DomainError> {
        let Some(profile) = self.pick_tenant().await? else {
            return Ok(());
        };
        let recent = self
            .messages
            .recent_messages(profile.tenant_id, RECENT_LIMIT)
            .await?;
        if recent.is_empty() {
            println!("No messages yet.");
        }
        for m in &recent {
            println!("{}", format_stored(m));
        }
        Ok(())
    }

    async fn export_log(&self) -> Result<(), DomainError> {
        let Some(profile) = self.pick_tenant().await? else {
            return Ok(());
        };
        let default_path = self
            .export_dir
            .join(format!("tenant_{}_messages.csv", profile.tenant_id));
        let path = Text::new("Export to:")
            .with_default(&default_path.to_string_lossy())
            .prompt()
            .map_err(prompt_err)?;
        let path = Path::new(path.trim());
        if tokio::fs::try_exists(path).await.unwrap_or(false)
            && !Confirm::new("File exists. Overwrite?")
                .with_default(false)
                .prompt()
                .map_err(prompt_err)?
        {
            return Ok(());
        }
        let rows = self
            .messages
            .recent_messages(profile.tenant_id, EXPORT_LIMIT)
            .await?;
        export_messages(path, &rows).await?;
        println!("Exported {} messages to {}.", rows.len(), path.display());
        Ok(())
    }
}

#[async_trait]
impl InputPort for TuiInputPort {
    async fn run(&self) -> Result<(), DomainError> {
        let menu = vec![
            MENU_TEST,
            MENU_INGEST,
            MENU_REGISTER,
            MENU_REPLAY,
            MENU_RECENT,
            MENU_EXPORT,
            MENU_EXIT,
        ];
        loop {
            let choice = match Select::new("What next?", menu.clone()).prompt() {
                Ok(c) => c,
                Err(e) if is_cancel(&e) => return Ok(()),
                Err(e) => return Err(prompt_err(e)),
            };
            let result = match choice {
                MENU_TEST => self.send_test_message().await,
                MENU_INGEST => self.ingest_file().await,
                MENU_REGISTER => self.register_tenant().await,
                MENU_REPLAY => self.replay_webhook().await,
                MENU_RECENT => self.show_recent().await,
                MENU_EXPORT => self.export_log().await,
                _ => return Ok(()),
            };
            // Errors inside an action are reported and the menu continues.
            if let Err(e) = result {
                println!("Error: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Degradation, Intent, MessageStatus};

    #[test]
    fn test_parse_list() {
        assert_eq!(parse_list(" menu, faq ,,prices"), vec!["menu", "faq", "prices"]);
        assert!(parse_list("  ").is_empty());
    }

    #[test]
    fn test_format_outcome_lists_degradations() {
        let o = ReplyOutcome {
            text: "We open at 8am.".into(),
            draft: "We open at 8am.".into(),
            detected_language: Language::En,
            target_language: Language::En,
            intent: Intent::Hours,
            confidence: 85,
            elapsed_ms: 900,
            used_web_search: true,
            translated: false,
            degradations: vec![Degradation::WebSearchUnavailable("timeout".into())],
        };
        let s = format_outcome(&o);
        assert!(s.starts_with("We open at 8am."));
        assert!(s.contains("confidence: 85%"));
        assert!(s.contains("web search: yes"));
        assert!(s.contains("WebSearchUnavailable"));
    }

    #[test]
    fn test_format_stored_shows_error_when_no_reply() {
        let m = StoredMessage {
            id: 1,
            tenant_id: 1,
            sender: "9477".into(),
            text: "hi".into(),
            received_at: 1704067200,
            status: MessageStatus::Failed,
            reply: None,
            language: None,
            confidence: None,
            processing_ms: None,
            error: Some("Generation failed: 503".into()),
        };
        let s = format_stored(&m);
        assert!(s.starts_with("[failed] 2024-01-01 00:00 9477: hi"));
        assert!(s.contains("✗ Generation failed: 503"));
    }

    #[test]
    fn test_tenant_label() {
        let p = TenantProfile {
            tenant_id: 3,
            name: "Lanka Bakes".into(),
            description: String::new(),
            persona: String::new(),
            supported_languages: vec![],
            default_language: Language::En,
            knowledge_sources: vec![],
            whatsapp_phone_id: None,
        };
        assert_eq!(tenant_label(&p), "#3 Lanka Bakes");
    }
}
