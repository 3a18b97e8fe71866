//! Heuristic detection of non-canonical term usage.

use serde::Serialize;
use std::collections::BTreeMap;

/// A short form of a multi-word canonical term used on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TermWarning {
    pub short_form: String,
    pub canonical_term: String,
    pub occurrences: usize,
    pub message: String,
}

const MIN_SHORT_FORM_LEN: usize = 4;

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '-' && c != '\'')
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

fn count_phrase(haystack: &[String], phrase: &[String]) -> usize {
    if phrase.is_empty() || haystack.len() < phrase.len() {
        return 0;
    }
    haystack
        .windows(phrase.len())
        .filter(|window| *window == phrase)
        .count()
}

/// Flag bare head words of multi-word terms.
///
/// The head word is the final word of the term. It is reported when it
/// appears more often in `text` than the full term does, unless the head
/// word is itself a canonical term.
pub(crate) fn validate(terms: &BTreeMap<String, String>, text: &str) -> Vec<TermWarning> {
    let text_words = words(text);
    let single_word_terms = terms
        .keys()
        .map(|t| words(t))
        .filter(|w| w.len() == 1)
        .map(|mut w| w.remove(0))
        .collect::<Vec<_>>();

    let mut warnings = Vec::new();
    for term in terms.keys() {
        let term_words = words(term);
        if term_words.len() < 2 {
            continue;
        }
        let Some(head) = term_words.last().cloned() else {
            continue;
        };
        if head.len() < MIN_SHORT_FORM_LEN || single_word_terms.contains(&head) {
            continue;
        }
        let bare = count_phrase(&text_words, std::slice::from_ref(&head));
        let full = count_phrase(&text_words, &term_words);
        if bare > full {
            let occurrences = bare - full;
            warnings.push(TermWarning {
                message: format!(
                    "\"{head}\" used {occurrences} time(s) without its canonical form \"{term}\""
                ),
                short_form: head,
                canonical_term: term.clone(),
                occurrences,
            });
        }
    }
    warnings
}
