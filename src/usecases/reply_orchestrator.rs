//! Reply orchestrator. Produces one ReplyOutcome per inbound message.
//!
//! Fixed pipeline: analyze → internal search → (web search) → generate → (translate).
//! Two branch points, both tagged with [`Branch`] in the logs. Stateless: every input is
//! passed in, so one instance is shared across all reply workers.

use crate::domain::language::{classify_intent, detect_language, is_written_in};
use crate::domain::{
    Degradation, DomainError, InboundMessage, Intent, Language, ReplyOutcome, ReplyPolicy,
    RetrievalResult, TenantProfile,
};
use crate::ports::{KnowledgePort, LlmPort, TranslatorPort, WebSearchPort};
use crate::usecases::prompt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Decision points of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    /// After internal search: are the hits good enough to skip the web?
    Sufficiency,
    /// After generation: does the draft need translating?
    Translation,
}

/// Service that turns an inbound message into a reply.
pub struct ReplyOrchestrator {
    llm: Arc<dyn LlmPort>,
    knowledge: Arc<dyn KnowledgePort>,
    web: Arc<dyn WebSearchPort>,
    translator: Arc<dyn TranslatorPort>,
    policy: ReplyPolicy,
}

struct Analysis {
    language: Language,
    intent: Intent,
}

impl ReplyOrchestrator {
    pub fn new(
        llm: Arc<dyn LlmPort>,
        knowledge: Arc<dyn KnowledgePort>,
        web: Arc<dyn WebSearchPort>,
        translator: Arc<dyn TranslatorPort>,
        policy: ReplyPolicy,
    ) -> Self {
        Self {
            llm,
            knowledge,
            web,
            translator,
            policy,
        }
    }

    pub fn policy(&self) -> &ReplyPolicy {
        &self.policy
    }

    /// Generate the reply for one message.
    ///
    /// Retrieval and translation failures are recovered and recorded in
    /// `ReplyOutcome::degradations`. Only a failed generation step is returned as an error
    /// (`DomainError::GenerationFailed`).
    pub async fn generate_reply(
        &self,
        message: &InboundMessage,
        profile: &TenantProfile,
    ) -> Result<ReplyOutcome, DomainError> {
        let started = Instant::now();
        let text = message.text.trim();

        if text.is_empty() {
            let err = DomainError::InputInvalid("empty message text".to_string());
            info!(tenant_id = profile.tenant_id, error = %err, "replying with clarification");
            return Ok(clarification(profile.default_language, started));
        }

        let mut degradations = Vec::new();

        // 1. Analyze
        let analysis = self.analyze(text, profile, &mut degradations).await;
        debug!(
            tenant_id = profile.tenant_id,
            language = %analysis.language,
            intent = %analysis.intent,
            "message analyzed"
        );

        // 2. Internal knowledge
        let mut retrieval = self.search_internal(text, profile, &mut degradations).await;

        // 3. Sufficiency decision
        let used_web_search = self.needs_web_search(&retrieval);
        info!(
            tenant_id = profile.tenant_id,
            branch = ?Branch::Sufficiency,
            internal = retrieval.internal_count(),
            top_score = retrieval.top_internal_score().unwrap_or(0.0),
            web = used_web_search,
            "retrieval sufficiency decided"
        );

        // 4. Web search
        if used_web_search {
            self.search_web(text, &mut retrieval, &mut degradations).await;
        }

        // 5. Generate
        let (context, used_snippets) = prompt::context_block(&retrieval, &self.policy);
        let request =
            prompt::generation_request(text, profile, analysis.intent, &context, &self.policy);
        let completion = self
            .llm
            .complete(&request)
            .await
            .map_err(|e| DomainError::GenerationFailed(e.to_string()))?;
        let draft = completion.text.trim().to_string();
        if draft.is_empty() {
            return Err(DomainError::GenerationFailed(
                "language model returned an empty reply".to_string(),
            ));
        }
        let confidence = match completion.confidence {
            Some(c) => c.min(100),
            None if used_snippets > 0 => self.policy.confidence_with_context,
            None => self.policy.confidence_without_context,
        };

        // 6. Translation decision: reply in the customer's language.
        let target_language = analysis.language;
        if !profile.supports(target_language) {
            debug!(
                tenant_id = profile.tenant_id,
                language = %target_language,
                "language not listed by tenant, translating anyway"
            );
        }
        let (final_text, translated) = self
            .translate_if_needed(&draft, profile, target_language, &mut degradations)
            .await;

        // 7. Finalize
        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            tenant_id = profile.tenant_id,
            language = %analysis.language,
            target = %target_language,
            confidence,
            translated,
            degradations = degradations.len(),
            elapsed_ms,
            "reply generated"
        );

        Ok(ReplyOutcome {
            text: final_text,
            draft,
            detected_language: analysis.language,
            target_language,
            intent: analysis.intent,
            confidence,
            elapsed_ms,
            used_web_search,
            translated,
            degradations,
        })
    }

    async fn analyze(
        &self,
        text: &str,
        profile: &TenantProfile,
        degradations: &mut Vec<Degradation>,
    ) -> Analysis {
        let language = detect_language(text);
        let heuristic = classify_intent(text);
        if !self.policy.model_intent {
            return Analysis {
                language,
                intent: heuristic,
            };
        }

        let intent = match self.llm.complete(&prompt::intent_request(text, profile)).await {
            Ok(c) => match Intent::from_label(&c.text) {
                Some(intent) => intent,
                None => {
                    debug!(label = %c.text, "unrecognised intent label, using heuristic");
                    heuristic
                }
            },
            Err(e) => {
                warn!(tenant_id = profile.tenant_id, error = %e, "intent analysis failed, using heuristic");
                degradations.push(Degradation::AnalysisFallback(e.to_string()));
                heuristic
            }
        };
        Analysis { language, intent }
    }

    async fn search_internal(
        &self,
        text: &str,
        profile: &TenantProfile,
        degradations: &mut Vec<Degradation>,
    ) -> RetrievalResult {
        let scope = profile.knowledge_scope();
        match self.knowledge.search(text, &scope, self.policy.top_k).await {
            Ok(mut hits) => {
                hits.truncate(self.policy.top_k);
                RetrievalResult::from_internal(hits)
            }
            Err(e) => {
                let err = DomainError::RetrievalUnavailable(e.to_string());
                warn!(tenant_id = profile.tenant_id, error = %err, "internal search failed, continuing without it");
                degradations.push(Degradation::InternalSearchUnavailable(e.to_string()));
                RetrievalResult::default()
            }
        }
    }

    fn needs_web_search(&self, retrieval: &RetrievalResult) -> bool {
        let weak_score = retrieval
            .top_internal_score()
            .is_none_or(|s| s < self.policy.min_relevance);
        let too_few = retrieval.internal_count() < self.policy.min_results;
        weak_score || too_few
    }

    async fn search_web(
        &self,
        text: &str,
        retrieval: &mut RetrievalResult,
        degradations: &mut Vec<Degradation>,
    ) {
        let query = prompt::web_query(text, self.policy.web_query_max_chars);
        match self.web.search(&query, self.policy.web_results).await {
            Ok(mut hits) => {
                hits.truncate(self.policy.web_results);
                debug!(results = hits.len(), "web search completed");
                retrieval.merge_web(hits);
            }
            Err(e) => {
                let err = DomainError::RetrievalUnavailable(e.to_string());
                warn!(error = %err, "web search failed, continuing without it");
                degradations.push(Degradation::WebSearchUnavailable(e.to_string()));
            }
        }
    }

    /// Returns the final text and whether a translation was applied.
    async fn translate_if_needed(
        &self,
        draft: &str,
        profile: &TenantProfile,
        target: Language,
        degradations: &mut Vec<Degradation>,
    ) -> (String, bool) {
        let source = profile.default_language;
        if target == source {
            return (draft.to_string(), false);
        }
        // Already in the target script (the model ignored the language instruction).
        if is_written_in(draft, target) {
            debug!(branch = ?Branch::Translation, target = %target, "draft already in target language");
            return (draft.to_string(), false);
        }

        debug!(branch = ?Branch::Translation, from = %source, to = %target, "translating draft");
        match self.translator.translate(draft, source, target).await {
            Ok(t) if !t.trim().is_empty() => (t.trim().to_string(), true),
            Ok(_) => {
                let reason = "translator returned empty text".to_string();
                warn!(tenant_id = profile.tenant_id, "{}", reason);
                degradations.push(Degradation::TranslationFailed(reason));
                (draft.to_string(), false)
            }
            Err(e) => {
                let err = DomainError::TranslationFailed(e.to_string());
                warn!(tenant_id = profile.tenant_id, error = %err, "delivering untranslated draft");
                degradations.push(Degradation::TranslationFailed(e.to_string()));
                (draft.to_string(), false)
            }
        }
    }
}

fn clarification(language: Language, started: Instant) -> ReplyOutcome {
    let text = prompt::clarification_reply(language).to_string();
    ReplyOutcome {
        text: text.clone(),
        draft: text,
        detected_language: language,
        target_language: language,
        intent: Intent::General,
        confidence: 0,
        elapsed_ms: started.elapsed().as_millis() as u64,
        used_web_search: false,
        translated: false,
        degradations: Vec::new(),
    }
}
