use crate::models::Book;

/// Tags every rendered document carries.
pub const BASE_TAGS: &[&str] = &["highlights", "koreader"];

/// Document-level tags for a set of books: base tags plus every note tag and
/// color tag, sorted and deduplicated without regard to case.
pub fn aggregate_tags<'a, I>(books: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a Book>,
{
    let mut tags: Vec<String> = BASE_TAGS.iter().map(|t| t.to_string()).collect();
    for book in books {
        for highlight in &book.highlights {
            tags.extend(highlight.enrichment.note_tags.iter().cloned());
            tags.extend(highlight.enrichment.color_tags.iter().cloned());
        }
    }

    // Base spellings sort first among case variants so dedup keeps them.
    tags.sort_by(|a, b| {
        a.to_lowercase()
            .cmp(&b.to_lowercase())
            .then_with(|| is_base(b).cmp(&is_base(a)))
            .then_with(|| a.cmp(b))
    });
    tags.dedup_by(|a, b| a.to_lowercase() == b.to_lowercase());
    tags
}

fn is_base(tag: &str) -> bool {
    BASE_TAGS.contains(&tag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Enrichment, Highlight};

    fn highlight(note_tags: &[&str], color_tags: &[&str]) -> Highlight {
        Highlight {
            enrichment: Enrichment {
                note_tags: note_tags.iter().map(|s| s.to_string()).collect(),
                color_tags: color_tags.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_base_tags_only() {
        let book = Book::empty();

        assert_eq!(aggregate_tags([&book]), vec!["highlights", "koreader"]);
    }

    #[test]
    fn test_sorted_and_case_insensitively_deduped() {
        let book = Book::new(
            "T",
            "A",
            None,
            vec![
                highlight(&["zeta", "Idea"], &["hl/insight"]),
                highlight(&["idea", "KOReader"], &["hl/insight", "alpha"]),
            ],
        );

        let tags = aggregate_tags([&book]);

        assert_eq!(tags, vec!["alpha", "highlights", "hl/insight", "Idea", "koreader", "zeta"]);
    }

    #[test]
    fn test_per_highlight_color_tags_untouched() {
        let book = Book::new("T", "A", None, vec![highlight(&[], &["z", "a"])]);

        let _ = aggregate_tags([&book]);

        assert_eq!(book.highlights[0].enrichment.color_tags, vec!["z", "a"]);
    }
}
