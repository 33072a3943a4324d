use crate::load::Dataset;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Known misspellings and legacy names → canonical spelling. Lookup is on
/// the exact cell value, before any trimming, matching how the extracts
/// actually misspell these.
static STATE_ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("Westbengal", "West Bengal"),
        ("West  Bengal", "West Bengal"),
        ("Uttaranchal", "Uttarakhand"),
        ("Orissa", "Odisha"),
        (
            "The Dadra And Nagar Haveli And Daman And Diu",
            "Dadra and Nagar Haveli",
        ),
    ])
});

/// Title-case with the first letter of every alphabetic run uppercased and
/// the rest lowered; any non-alphabetic character starts a new run.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

/// Canonicalize one state cell: alias lookup, then trim and title-case.
/// Pure and idempotent: applying it twice equals applying it once.
pub fn canonical_state(raw: &str) -> String {
    let mapped = STATE_ALIASES.get(raw).copied().unwrap_or(raw);
    title_case(mapped.trim())
}

/// Rewrite every state cell in place. Numeric fill-with-zero already happens
/// at deserialization, so this is the whole of the normalization pass and
/// reapplying it is a no-op.
pub fn normalize_dataset(dataset: &mut Dataset) {
    for r in &mut dataset.enrolment.rows {
        r.state = canonical_state(&r.state);
    }
    for r in &mut dataset.biometric.rows {
        r.state = canonical_state(&r.state);
    }
    for r in &mut dataset.demographic.rows {
        r.state = canonical_state(&r.state);
    }
}
