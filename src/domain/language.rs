//! Local language and intent heuristics. No I/O.

use super::entities::{Intent, Language};

const SINHALA: (u32, u32) = (0x0D80, 0x0DFF);
const TAMIL: (u32, u32) = (0x0B80, 0x0BFF);

/// Share of alphabetic characters a script needs before the text counts as that language.
const SCRIPT_RATIO: f64 = 0.3;

fn in_range(c: char, (lo, hi): (u32, u32)) -> bool {
    (lo..=hi).contains(&(c as u32))
}

fn script_range(language: Language) -> Option<(u32, u32)> {
    match language {
        Language::Si => Some(SINHALA),
        Language::Ta => Some(TAMIL),
        Language::En => None,
    }
}

/// Detect whether text is primarily Sinhala, Tamil or English.
///
/// Counts alphabetic characters; a native script wins when its share exceeds 30%.
/// Text with no alphabetic characters is English.
pub fn detect_language(text: &str) -> Language {
    let mut total = 0usize;
    let mut sinhala = 0usize;
    let mut tamil = 0usize;
    for c in text.chars() {
        // Sinhala/Tamil vowel signs are marks, not alphabetic; count them with their script.
        let si = in_range(c, SINHALA);
        let ta = in_range(c, TAMIL);
        if c.is_alphabetic() || si || ta {
            total += 1;
            if si {
                sinhala += 1;
            } else if ta {
                tamil += 1;
            }
        }
    }
    if total == 0 {
        return Language::En;
    }
    let total = total as f64;
    let si_ratio = sinhala as f64 / total;
    let ta_ratio = tamil as f64 / total;
    if si_ratio > SCRIPT_RATIO && si_ratio >= ta_ratio {
        Language::Si
    } else if ta_ratio > SCRIPT_RATIO {
        Language::Ta
    } else {
        Language::En
    }
}

/// True if `text` already reads as `language`.
///
/// For native scripts this means any character of that script is present; for English,
/// that the text detects as English.
pub fn is_written_in(text: &str, language: Language) -> bool {
    match script_range(language) {
        Some(range) => text.chars().any(|c| in_range(c, range)),
        None => detect_language(text) == Language::En,
    }
}

/// Keyword table for the coarse intent heuristic. First match wins.
const INTENT_KEYWORDS: &[(Intent, &[&str])] = &[
    (
        Intent::Complaint,
        &["complain", "refund", "broken", "damaged", "not working", "bad service"],
    ),
    (
        Intent::Pricing,
        &["price", "cost", "how much", "rate", "rs.", "lkr", "discount", "මිල", "விலை"],
    ),
    (
        Intent::Availability,
        &["available", "in stock", "stock", "do you have", "තියෙනවද"],
    ),
    (
        Intent::Hours,
        &["open", "close", "hours", "timing", "when are you"],
    ),
    (
        Intent::Location,
        &["where", "address", "location", "directions", "branch"],
    ),
    (
        Intent::Order,
        &["order", "buy", "purchase", "deliver", "booking", "book"],
    ),
    (
        Intent::Greeting,
        &["hello", "hi", "hey", "good morning", "good evening", "ආයුබෝවන්", "வணக்கம்"],
    ),
];

/// Classify a message into a coarse intent by keyword lookup.
pub fn classify_intent(text: &str) -> Intent {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric() && c != '.')
        .filter(|w| !w.is_empty())
        .collect();
    for (intent, keywords) in INTENT_KEYWORDS {
        let hit = keywords.iter().any(|k| {
            if k.contains(' ') || !k.is_ascii() {
                lower.contains(k)
            } else {
                words.iter().any(|w| w.trim_end_matches('.') == k.trim_end_matches('.'))
            }
        });
        if hit {
            return *intent;
        }
    }
    Intent::General
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_english() {
        assert_eq!(detect_language("What are your opening hours?"), Language::En);
    }

    #[test]
    fn test_detect_sinhala() {
        assert_eq!(detect_language("ඔබගේ මිල කීයද?"), Language::Si);
    }

    #[test]
    fn test_detect_tamil() {
        assert_eq!(detect_language("விலை என்ன?"), Language::Ta);
    }

    #[test]
    fn test_detect_mixed_mostly_english() {
        assert_eq!(
            detect_language("Please tell me the price of the blue shirt මිල"),
            Language::En
        );
    }

    #[test]
    fn test_detect_no_letters_defaults_to_english() {
        assert_eq!(detect_language("123 ?!"), Language::En);
        assert_eq!(detect_language(""), Language::En);
    }

    #[test]
    fn test_is_written_in() {
        assert!(is_written_in("ස්තූතියි", Language::Si));
        assert!(!is_written_in("Thank you", Language::Si));
        assert!(is_written_in("Thank you", Language::En));
    }

    #[test]
    fn test_classify_intent() {
        assert_eq!(classify_intent("How much is the cake?"), Intent::Pricing);
        assert_eq!(classify_intent("Hi there"), Intent::Greeting);
        assert_eq!(classify_intent("Are you open on Sunday?"), Intent::Hours);
        assert_eq!(classify_intent("I want a refund, it arrived broken"), Intent::Complaint);
        assert_eq!(classify_intent("Tell me about yourselves"), Intent::General);
    }

    #[test]
    fn test_classify_does_not_match_substrings() {
        // "this" contains "hi" but is not a greeting
        assert_eq!(classify_intent("this thing"), Intent::General);
    }
}
