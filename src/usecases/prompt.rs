//! Prompt assembly for the reply pipeline.

use crate::domain::{Intent, Language, ReplyPolicy, RetrievalResult, Snippet, TenantProfile};
use crate::ports::CompletionRequest;

/// Fixed reply for empty messages, in the tenant's default language.
pub fn clarification_reply(language: Language) -> &'static str {
    match language {
        Language::Si => "කරුණාකර ඔබගේ ප්‍රශ්නය ටිකක් විස්තර කර එවන්න. අපි ඔබට උදව් කිරීමට සූදානම්.",
        Language::Ta => "தயவுசெய்து உங்கள் கேள்வியை விரிவாக அனுப்பவும். உங்களுக்கு உதவ நாங்கள் தயாராக உள்ளோம்.",
        Language::En => "Could you please tell me a bit more about what you need? I'm happy to help.",
    }
}

/// Ask the model for a one-word intent label.
pub fn intent_request(text: &str, profile: &TenantProfile) -> CompletionRequest {
    CompletionRequest {
        system: format!(
            "You classify customer messages sent to {} on WhatsApp. \
             Answer with exactly one word from: greeting, pricing, availability, hours, \
             location, order, complaint, general.",
            profile.name
        ),
        user: text.to_string(),
        temperature: 0.0,
        structured: false,
    }
}

/// Cut to `max` characters on a char boundary, marking the cut with an ellipsis.
pub fn truncate_chars(text: &str, max: usize) -> String {
    let t = text.trim();
    if t.chars().count() <= max {
        t.to_string()
    } else {
        let cut: String = t.chars().take(max).collect();
        format!("{}...", cut.trim_end())
    }
}

/// Collapse whitespace and cap the length; used as the web search query.
pub fn web_query(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(max_chars).collect()
}

fn push_section<'a>(
    out: &mut String,
    title: &str,
    snippets: impl Iterator<Item = &'a Snippet>,
    limit: usize,
    max_chars: usize,
) -> usize {
    let mut used = 0;
    for s in snippets.take(limit) {
        if used == 0 {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(title);
            out.push('\n');
        }
        out.push_str("- ");
        out.push_str(&truncate_chars(&s.text, max_chars));
        out.push('\n');
        used += 1;
    }
    used
}

/// Context block built from retrieval results, plus how many snippets made it in.
pub fn context_block(retrieval: &RetrievalResult, policy: &ReplyPolicy) -> (String, usize) {
    let mut out = String::new();
    let internal = push_section(
        &mut out,
        "Business documents:",
        retrieval.internal(),
        policy.prompt_internal_snippets,
        policy.snippet_chars,
    );
    let web = push_section(
        &mut out,
        "Additional web information:",
        retrieval.web(),
        policy.prompt_web_snippets,
        policy.snippet_chars,
    );
    (out, internal + web)
}

/// Generation prompt. The draft is always written in the tenant's default language.
pub fn generation_request(
    text: &str,
    profile: &TenantProfile,
    intent: Intent,
    context: &str,
    policy: &ReplyPolicy,
) -> CompletionRequest {
    let description = if profile.description.trim().is_empty() {
        "(no description)"
    } else {
        profile.description.trim()
    };
    let context = if context.trim().is_empty() {
        "(no additional information found)"
    } else {
        context.trim_end()
    };
    let system = format!(
        "You are the WhatsApp assistant for {name}.\n\
         Business description: {description}\n\
         Persona: {persona}\n\n\
         Customer intent: {intent}\n\n\
         Available context:\n{context}\n\n\
         Instructions:\n\
         1. Reply in {language}.\n\
         2. Be helpful, friendly and professional; keep it concise.\n\
         3. Use the context above; if it does not contain the answer, say so politely.\n\
         4. Respond with a JSON object: {{\"reply\": \"<message>\", \"confidence\": <0-100>}}.",
        name = profile.name,
        persona = profile.persona.trim(),
        language = profile.default_language.name(),
    );
    CompletionRequest {
        system,
        user: text.to_string(),
        temperature: policy.temperature,
        structured: true,
    }
}

/// Translation prompt for the model-backed translator.
pub fn translation_request(text: &str, from: Language, to: Language) -> CompletionRequest {
    CompletionRequest {
        system: format!(
            "Translate the user's message from {} to {}. \
             Output only the translation, keeping names, prices and phone numbers unchanged.",
            from.name(),
            to.name()
        ),
        user: text.to_string(),
        temperature: 0.0,
        structured: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SnippetOrigin, WebHit};

    fn profile() -> TenantProfile {
        TenantProfile {
            tenant_id: 7,
            name: "Lanka Bakes".into(),
            description: "Bakery in Kandy".into(),
            persona: "Warm and brief.".into(),
            supported_languages: vec![Language::En, Language::Si],
            default_language: Language::En,
            knowledge_sources: vec![],
            whatsapp_phone_id: None,
        }
    }

    fn internal(text: &str, score: f32) -> Snippet {
        Snippet {
            origin: SnippetOrigin::Internal,
            source: "menu".into(),
            text: text.into(),
            score,
        }
    }

    #[test]
    fn test_truncate_chars_multibyte_safe() {
        assert_eq!(truncate_chars("ආයුබෝවන්", 3), "ආයු...");
        assert_eq!(truncate_chars("short", 10), "short");
    }

    #[test]
    fn test_web_query_collapses_whitespace() {
        assert_eq!(web_query("  cake \n\n price  today ", 256), "cake price today");
        assert_eq!(web_query("abcdef", 3), "abc");
    }

    #[test]
    fn test_context_block_limits_snippets() {
        let policy = ReplyPolicy::default();
        let mut r = RetrievalResult::from_internal(vec![
            internal("a", 0.9),
            internal("b", 0.8),
            internal("c", 0.7),
            internal("d", 0.6),
        ]);
        r.merge_web(vec![
            WebHit { title: String::new(), snippet: "w1".into(), url: "u1".into() },
            WebHit { title: String::new(), snippet: "w2".into(), url: "u2".into() },
            WebHit { title: String::new(), snippet: "w3".into(), url: "u3".into() },
        ]);
        let (block, used) = context_block(&r, &policy);
        assert_eq!(used, 5);
        assert!(block.contains("Business documents:"));
        assert!(block.contains("- c"));
        assert!(!block.contains("- d"));
        assert!(block.contains("Additional web information:"));
        assert!(block.contains("- w2"));
        assert!(!block.contains("- w3"));
    }

    #[test]
    fn test_context_block_empty() {
        let (block, used) = context_block(&RetrievalResult::default(), &ReplyPolicy::default());
        assert!(block.is_empty());
        assert_eq!(used, 0);
    }

    #[test]
    fn test_generation_request_mentions_persona_and_language() {
        let req = generation_request(
            "Do you have chocolate cake?",
            &profile(),
            Intent::Availability,
            "",
            &ReplyPolicy::default(),
        );
        assert!(req.structured);
        assert!(req.system.contains("Lanka Bakes"));
        assert!(req.system.contains("Warm and brief."));
        assert!(req.system.contains("Reply in English"));
        assert!(req.system.contains("availability"));
        assert!(req.system.contains("(no additional information found)"));
        assert_eq!(req.user, "Do you have chocolate cake?");
    }
}
