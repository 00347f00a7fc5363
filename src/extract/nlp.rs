//! Frequency-based keyword and summary extraction
//!
//! Small and dependency-free on purpose; an `Extractor` implementation can
//! override `keywords` and `summarize` with a real NLP backend.

use std::collections::{HashMap, HashSet};

const ENGLISH_STOPWORDS: &[&str] = &[
    "a", "about", "after", "again", "all", "also", "an", "and", "any", "are", "as", "at", "be",
    "because", "been", "before", "being", "but", "by", "can", "could", "did", "do", "does", "for",
    "from", "had", "has", "have", "he", "her", "his", "how", "i", "if", "in", "into", "is", "it",
    "its", "just", "more", "most", "new", "no", "not", "now", "of", "on", "one", "or", "other",
    "our", "out", "over", "said", "says", "she", "so", "some", "than", "that", "the", "their",
    "them", "then", "there", "these", "they", "this", "those", "to", "two", "up", "was", "we",
    "were", "what", "when", "which", "who", "will", "with", "would", "you", "your",
];

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .map(|w| w.trim_matches('\'').to_lowercase())
        .filter(|w| w.chars().count() > 2 && !w.chars().all(|c| c.is_ascii_digit()))
}

fn is_stopword(word: &str, language: &str) -> bool {
    (language == "en" || language == "auto") && ENGLISH_STOPWORDS.contains(&word)
}

fn word_frequencies(text: &str, language: &str) -> (HashMap<String, usize>, Vec<String>) {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut order = Vec::new();
    for word in tokenize(text).filter(|w| !is_stopword(w, language)) {
        let count = counts.entry(word.clone()).or_insert(0);
        if *count == 0 {
            order.push(word);
        }
        *count += 1;
    }
    (counts, order)
}

/// Returns up to `max` most frequent non-stopwords, ties broken by first appearance
pub fn keywords(text: &str, max: usize, language: &str) -> Vec<String> {
    let (counts, order) = word_frequencies(text, language);

    let mut ranked: Vec<(usize, String)> = order.into_iter().enumerate().collect();
    ranked.sort_by(|(ia, a), (ib, b)| counts[b].cmp(&counts[a]).then(ia.cmp(ib)));

    ranked.into_iter().take(max).map(|(_, w)| w).collect()
}

/// Splits text into sentences on `.`, `!` and `?` followed by whitespace
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') && chars.peek().map_or(true, |n| n.is_whitespace()) {
            let sentence = current.trim().to_string();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            current.clear();
        }
    }

    let rest = current.trim();
    if !rest.is_empty() {
        sentences.push(rest.to_string());
    }

    sentences
}

/// Picks the `max_sentences` highest scoring sentences, kept in text order
///
/// A sentence scores the summed frequency of its words, normalised by length,
/// plus a bonus for each word it shares with the title.
pub fn summarize(title: &str, text: &str, max_sentences: usize) -> Vec<String> {
    let sentences = split_sentences(text);
    if sentences.len() <= max_sentences {
        return sentences;
    }

    let (counts, _) = word_frequencies(text, "auto");
    let title_words: HashSet<String> = tokenize(title).collect();

    let mut scored: Vec<(usize, f64)> = sentences
        .iter()
        .enumerate()
        .map(|(i, sentence)| {
            let words: Vec<String> = tokenize(sentence).collect();
            if words.is_empty() {
                return (i, 0.0);
            }
            let frequency: usize = words.iter().filter_map(|w| counts.get(w)).sum();
            let title_hits = words.iter().filter(|w| title_words.contains(*w)).count();
            let score = frequency as f64 / words.len() as f64 + title_hits as f64;
            (i, score)
        })
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    let mut chosen: Vec<usize> = scored.into_iter().take(max_sentences).map(|(i, _)| i).collect();
    chosen.sort_unstable();

    chosen.into_iter().map(|i| sentences[i].clone()).collect()
}
