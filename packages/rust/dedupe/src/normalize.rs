//! Normalization and fuzzy comparison of business identity fields.
//!
//! Tuned for the German market: umlaut transliteration, legal-form
//! stripping, and +49 trunk-prefix handling.

use std::sync::LazyLock;

use regex::Regex;

static LEGAL_FORMS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(gmbh|ag|kg|ohg|eg|e\.?k\.?|inh\.?|&\s*co\.?|co\.?|gbr|mbh|ug|partg|partner|gesellschaft|company)\b",
    )
    .unwrap_or_else(|e| panic!("invalid legal-form pattern: {e}"))
});

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s+").unwrap_or_else(|e| panic!("invalid whitespace pattern: {e}"))
});

/// Reduce a phone number to comparable national digits.
///
/// Strips everything non-numeric, the `+49`/`0049` country prefix, and the
/// leading trunk zero: `+49 231 123456`, `0049231123456` and `0231/123456`
/// all come out as `231123456`.
pub fn normalize_phone(phone: &str) -> String {
    let mut digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.starts_with("0049") && digits.len() > 12 {
        digits.drain(..4);
    } else if digits.starts_with("49") && digits.len() > 10 {
        digits.drain(..2);
    }
    if digits.starts_with('0') {
        digits.remove(0);
    }
    digits
}

/// Reduce a company name to a comparable form: lowercase, umlauts folded,
/// legal forms and punctuation dropped, whitespace collapsed.
pub fn normalize_name(name: &str) -> String {
    let mut folded = String::with_capacity(name.len());
    for ch in name.to_lowercase().chars() {
        match ch {
            'ä' => folded.push_str("ae"),
            'ö' => folded.push_str("oe"),
            'ü' => folded.push_str("ue"),
            'ß' => folded.push_str("ss"),
            _ => folded.push(ch),
        }
    }

    let without_legal = LEGAL_FORMS.replace_all(&folded, "");
    let cleaned: String = without_legal
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();

    WHITESPACE.replace_all(cleaned.trim(), " ").into_owned()
}

/// Extract a five-digit postal code, if the input holds one.
pub fn normalize_postal(postal: &str) -> Option<String> {
    let digits: String = postal.chars().filter(|c| c.is_ascii_digit()).collect();
    (digits.len() == 5).then_some(digits)
}

/// Whether two phone numbers identify the same line.
///
/// Exact digit match, containment (for numbers recorded with and without
/// area code, both at least 6 digits), or a near-identical edit distance
/// for transcription slips.
pub fn phones_match(a: &str, b: &str) -> bool {
    let na = normalize_phone(a);
    let nb = normalize_phone(b);
    if na.is_empty() || nb.is_empty() {
        return false;
    }
    if na == nb {
        return true;
    }
    if (na.contains(&nb) || nb.contains(&na)) && na.len().min(nb.len()) >= 6 {
        return true;
    }
    strsim::normalized_levenshtein(&na, &nb) >= 0.9
}

/// Similarity of two company names in 0.0..=1.0, on normalized forms.
///
/// The best of edit-distance ratio, sorted-token comparison, and a fixed
/// 0.85 for containment of one name in the other (both longer than 3
/// characters).
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let na = normalize_name(a);
    let nb = normalize_name(b);
    if na.is_empty() || nb.is_empty() {
        return 0.0;
    }
    if na == nb {
        return 1.0;
    }

    let direct = strsim::normalized_levenshtein(&na, &nb);

    let sorted = |s: &str| {
        let mut tokens: Vec<&str> = s.split_whitespace().collect();
        tokens.sort_unstable();
        tokens.join(" ")
    };
    let token_sorted = strsim::normalized_levenshtein(&sorted(&na), &sorted(&nb));

    let containment = if na.len() > 3 && nb.len() > 3 && (na.contains(&nb) || nb.contains(&na)) {
        0.85
    } else {
        0.0
    };

    direct.max(token_sorted).max(containment)
}

/// First significant token of the normalized name, used for blocking
/// candidate lookups.
pub fn name_bucket(name: &str) -> String {
    normalize_name(name)
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_string()
}
