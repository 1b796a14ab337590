pub const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, PartialEq)]
pub struct Book {
    pub title: String,
    pub author: String,
    pub uid: Option<String>,
    pub highlights: Vec<Highlight>,
    pub counts: BookCounts,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BookCounts {
    pub highlights: usize,
    pub notes: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Highlight {
    pub text: String,
    pub note: Option<String>,
    pub color: Option<String>,
    pub page: Option<i64>,
    pub location: String,
    /// ISO-8601 instant or date as found in (or converted from) the export.
    pub created: Option<String>,
    pub chapter: Option<String>,
    pub enrichment: Enrichment,
}

/// Fields derived from a highlight by the enricher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enrichment {
    pub id: String,
    pub color: Option<String>,
    pub color_tags: Vec<String>,
    pub note_tags: Vec<String>,
    pub note_links: Vec<String>,
}

impl Book {
    /// Builds a book, falling back to "Unknown" for blank title or author.
    pub fn new(title: &str, author: &str, uid: Option<String>, highlights: Vec<Highlight>) -> Self {
        let counts = BookCounts::of(&highlights);
        Book {
            title: or_unknown(title),
            author: or_unknown(author),
            uid: uid
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty()),
            highlights,
            counts,
        }
    }

    pub fn empty() -> Self {
        Book::new(UNKNOWN, UNKNOWN, None, Vec::new())
    }
}

impl BookCounts {
    pub fn of(highlights: &[Highlight]) -> Self {
        BookCounts {
            highlights: highlights.len(),
            notes: highlights.iter().filter(|h| h.has_note()).count(),
        }
    }
}

impl Highlight {
    pub fn has_note(&self) -> bool {
        self.note.as_deref().is_some_and(|n| !n.trim().is_empty())
    }
}

fn or_unknown(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        UNKNOWN.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_title_and_author_fall_back_to_unknown() {
        let book = Book::new("  ", "", None, Vec::new());

        assert_eq!(book.title, "Unknown");
        assert_eq!(book.author, "Unknown");
    }

    #[test]
    fn test_counts_ignore_blank_notes() {
        let highlights = vec![
            Highlight { note: Some("kept".into()), ..Default::default() },
            Highlight { note: Some("   ".into()), ..Default::default() },
            Highlight::default(),
        ];

        let book = Book::new(" Dune ", " Frank Herbert ", Some(" ".into()), highlights);

        assert_eq!(book.title, "Dune");
        assert_eq!(book.author, "Frank Herbert");
        assert_eq!(book.uid, None);
        assert_eq!(book.counts, BookCounts { highlights: 3, notes: 1 });
    }
}
