use crate::identity::{book_key, highlight_id};
use crate::models::{Book, Enrichment, Highlight};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static NOTE_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\s)#([\p{L}\p{N}_-]+)").expect("valid note tag regex"));
static NOTE_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[([^\[\]]+?)\]\]").expect("valid note link regex"));

const TAG_TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?'];

/// Color name to tag list lookup. Keys are stored normalized.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColorTagMap {
    entries: HashMap<String, Vec<String>>,
}

impl ColorTagMap {
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: IntoIterator,
        V::Item: AsRef<str>,
    {
        let mut map: HashMap<String, Vec<String>> = HashMap::new();
        for (color, tags) in entries {
            let Some(key) = normalize_color(Some(color.as_ref())) else {
                continue;
            };
            let slot = map.entry(key).or_default();
            for tag in tags {
                let tag = tag.as_ref().trim().trim_start_matches('#');
                if !tag.is_empty() {
                    slot.push(tag.to_string());
                }
            }
        }
        ColorTagMap { entries: map }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tags configured for an already normalized color, in configured order.
    pub fn tags_for(&self, color: &str) -> Vec<String> {
        let found = self.entries.get(color).or_else(|| {
            let compact: String = color.chars().filter(|c| !c.is_whitespace()).collect();
            self.entries.get(&compact)
        });
        match found {
            Some(tags) => dedup_preserving_order(tags.iter().cloned()),
            None => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichOptions {
    pub color_tags: ColorTagMap,
    pub apply_color_tags: bool,
}

pub fn normalize_color(color: Option<&str>) -> Option<String> {
    let normalized = color?.trim().to_lowercase();
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

pub fn extract_note_tags(note: Option<&str>) -> Vec<String> {
    let Some(note) = note else {
        return Vec::new();
    };
    let tags = NOTE_TAG_RE
        .captures_iter(note)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim_end_matches(TAG_TRAILING_PUNCTUATION))
        .filter(|tag| !tag.is_empty())
        .map(String::from);
    dedup_preserving_order(tags)
}

pub fn extract_note_links(note: Option<&str>) -> Vec<String> {
    let Some(note) = note else {
        return Vec::new();
    };
    let links = NOTE_LINK_RE
        .captures_iter(note)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().split('|').next().unwrap_or_default().trim())
        .filter(|target| !target.is_empty())
        .map(String::from);
    dedup_preserving_order(links)
}

/// Derives the enrichment for one highlight. Pure in its inputs.
pub fn enrich_highlight(key: &str, highlight: &Highlight, options: &EnrichOptions) -> Enrichment {
    let color = normalize_color(highlight.color.as_deref());
    let color_tags = match (&color, options.apply_color_tags) {
        (Some(c), true) => options.color_tags.tags_for(c),
        _ => Vec::new(),
    };

    Enrichment {
        id: highlight_id(key, &highlight.location, &highlight.text),
        color,
        color_tags,
        note_tags: extract_note_tags(highlight.note.as_deref()),
        note_links: extract_note_links(highlight.note.as_deref()),
    }
}

pub fn enrich_book(book: &mut Book, options: &EnrichOptions) {
    let key = book_key(book);
    for highlight in &mut book.highlights {
        highlight.enrichment = enrich_highlight(&key, highlight, options);
    }
}

fn dedup_preserving_order<I: IntoIterator<Item = String>>(items: I) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}
