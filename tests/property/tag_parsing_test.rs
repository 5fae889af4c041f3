//! Property-based tests for tag input parsing.
//!
//! For any free-text input built from arbitrary tokens and separators,
//! parsing SHALL produce trimmed, non-empty, case-insensitively unique
//! names that preserve the spelling of each name's first occurrence.

use std::collections::HashSet;

use proptest::prelude::*;
use stashed::managers::tag_reconciler::parse_tag_input;

/// Strategy for plausible tag tokens: letters and digits, mixed case.
fn arb_token() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9]{0,11}"
}

/// Strategy for the separators users actually type between tags.
fn arb_separator() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just(", "),
        Just(","),
        Just(" "),
        Just("  "),
        Just(" , "),
        Just(",, "),
        Just("\t"),
    ]
}

/// Joins tokens with independently chosen separators.
fn arb_input() -> impl Strategy<Value = (Vec<String>, String)> {
    (
        proptest::collection::vec(arb_token(), 0..8),
        proptest::collection::vec(arb_separator(), 8),
    )
        .prop_map(|(tokens, seps)| {
            let mut input = String::new();
            for (i, token) in tokens.iter().enumerate() {
                if i > 0 {
                    input.push_str(seps[i]);
                }
                input.push_str(token);
            }
            (tokens, input)
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // Every parsed name is a trimmed, non-empty token with no separator
    // characters left in it.
    #[test]
    fn parsed_names_are_clean((_tokens, input) in arb_input()) {
        for name in parse_tag_input(&input) {
            prop_assert!(!name.is_empty());
            prop_assert!(!name.contains(','));
            prop_assert!(!name.chars().any(char::is_whitespace));
            prop_assert_eq!(name.trim(), name.as_str());
        }
    }

    // Names are unique ignoring case.
    #[test]
    fn parsed_names_unique_case_insensitively((_tokens, input) in arb_input()) {
        let names = parse_tag_input(&input);
        let lowered: HashSet<String> = names.iter().map(|n| n.to_lowercase()).collect();
        prop_assert_eq!(lowered.len(), names.len());
    }

    // Parsing covers exactly the input's tokens (up to case folding), and
    // each name keeps the spelling of its first occurrence.
    #[test]
    fn parsed_names_cover_tokens_preserving_first_spelling((tokens, input) in arb_input()) {
        let names = parse_tag_input(&input);

        let parsed: HashSet<String> = names.iter().map(|n| n.to_lowercase()).collect();
        let expected: HashSet<String> = tokens.iter().map(|t| t.to_lowercase()).collect();
        prop_assert_eq!(&parsed, &expected);

        for name in &names {
            let first = tokens
                .iter()
                .find(|t| t.to_lowercase() == name.to_lowercase())
                .expect("every parsed name comes from some token");
            prop_assert_eq!(name, first);
        }
    }

    // Re-parsing the joined output changes nothing.
    #[test]
    fn parsing_is_idempotent((_tokens, input) in arb_input()) {
        let names = parse_tag_input(&input);
        let rejoined = names.join(", ");
        prop_assert_eq!(parse_tag_input(&rejoined), names);
    }
}

// ─── Pinned examples ───

#[test]
fn test_repeated_name_dedups_against_first_spelling() {
    assert_eq!(
        parse_tag_input("work, Work travel"),
        vec!["work".to_string(), "travel".to_string()]
    );
}

#[test]
fn test_empty_and_separator_only_inputs() {
    assert!(parse_tag_input("").is_empty());
    assert!(parse_tag_input("   ").is_empty());
    assert!(parse_tag_input(" , , ").is_empty());
}

#[test]
fn test_case_of_first_occurrence_wins() {
    assert_eq!(
        parse_tag_input("Rust rust RUST"),
        vec!["Rust".to_string()]
    );
}
