//! Markdown rendering of books, with a YAML front matter block.
//!
//! Output is a pure function of the book, the enrichment already attached to
//! it and the [`RenderContext`]; the `updated` date comes from the context so
//! callers decide which clock to use.

use crate::models::{Book, BookCounts, Highlight};
use crate::parser::parse_timestamp;
use crate::tags::aggregate_tags;
use chrono::NaiveDate;

pub const SOURCE_LABEL: &str = "KOReader";
pub const MAX_FILENAME_CHARS: usize = 120;
const ILLEGAL_FILENAME_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

#[derive(Debug, Clone)]
pub struct RenderContext<'a> {
    pub today: NaiveDate,
    /// Kind of source the export came from, e.g. "local".
    pub import_source: &'a str,
    pub src_path: &'a str,
}

/// Escapes a value for a double-quoted YAML scalar.
pub fn escape_scalar(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

fn quoted(s: &str) -> String {
    format!("\"{}\"", escape_scalar(s))
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn render_book(book: &Book, ctx: &RenderContext) -> String {
    let mut out = front_matter(
        &book.title,
        &book.author,
        &aggregate_tags([book]),
        book.counts,
        ctx,
    );
    out.push('\n');
    out.push_str(&book_body(book));
    out
}

/// Renders several books into one document titled after `label`.
pub fn render_collection(label: &str, books: &[Book], ctx: &RenderContext) -> String {
    let mut authors: Vec<&str> = Vec::new();
    for book in books {
        if !authors.contains(&book.author.as_str()) {
            authors.push(&book.author);
        }
    }
    let counts = books.iter().fold(BookCounts::default(), |acc, b| BookCounts {
        highlights: acc.highlights + b.counts.highlights,
        notes: acc.notes + b.counts.notes,
    });

    let mut out = front_matter(label, &authors.join(", "), &aggregate_tags(books), counts, ctx);
    let bodies: Vec<String> = books.iter().map(book_body).collect();
    out.push('\n');
    out.push_str(&bodies.join("\n"));
    out
}

fn front_matter(
    title: &str,
    author: &str,
    tags: &[String],
    counts: BookCounts,
    ctx: &RenderContext,
) -> String {
    let tag_list = tags.iter().map(|t| quoted(t)).collect::<Vec<_>>().join(", ");

    let lines = [
        "---".to_string(),
        format!("title: {}", quoted(title)),
        format!("author: {}", quoted(author)),
        format!("source: {}", quoted(SOURCE_LABEL)),
        format!("updated: {}", quoted(&ctx.today.format("%Y-%m-%d").to_string())),
        format!("tags: [{}]", tag_list),
        "koreader:".to_string(),
        format!("  import_source: {}", quoted(ctx.import_source)),
        format!("  src_path: {}", quoted(ctx.src_path)),
        "  counts:".to_string(),
        format!("    highlights: {}", counts.highlights),
        format!("    notes: {}", counts.notes),
        "---".to_string(),
    ];
    lines.join("\n") + "\n"
}

fn book_body(book: &Book) -> String {
    let mut out = format!(
        "# {} - {}\n",
        collapse_whitespace(&book.title),
        collapse_whitespace(&book.author)
    );
    let blocks: Vec<String> = book
        .highlights
        .iter()
        .enumerate()
        .map(|(i, h)| highlight_block(i + 1, h))
        .collect();
    if !blocks.is_empty() {
        out.push('\n');
        out.push_str(&blocks.join("\n---\n\n"));
    }
    out
}

fn highlight_block(position: usize, highlight: &Highlight) -> String {
    let mut out = format!("## Highlight {}\n", position);

    let meta = meta_line(highlight);
    if !meta.is_empty() {
        out.push_str(&format!("*{}*\n", meta));
    }

    for line in highlight.text.split('\n') {
        out.push_str(&format!("> {}\n", line.trim_end_matches('\r')));
    }

    if let Some(note) = highlight.note.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        out.push_str(&format!("\n**Note:** {}\n", note));
    }
    out
}

fn meta_line(highlight: &Highlight) -> String {
    let mut bits: Vec<String> = Vec::new();

    if let Some(page) = highlight.page {
        bits.push(format!("Page {}", page));
    }
    if let Some(chapter) = &highlight.chapter {
        bits.push(collapse_whitespace(chapter));
    }
    if !highlight.location.trim().is_empty() {
        bits.push(format!("Location {}", highlight.location.trim()));
    }
    if let Some(created) = &highlight.created {
        bits.push(match parse_timestamp(created) {
            Some(dt) => dt.format("%Y-%m-%d").to_string(),
            None => created.clone(),
        });
    }
    if let Some(color) = &highlight.enrichment.color {
        bits.push(color.clone());
    }
    if !highlight.enrichment.color_tags.is_empty() {
        bits.push(
            highlight
                .enrichment
                .color_tags
                .iter()
                .map(|t| format!("#{}", t))
                .collect::<Vec<_>>()
                .join(" "),
        );
    }

    bits.join(" | ")
}

/// Turns arbitrary text into a safe file stem: illegal characters dropped,
/// whitespace collapsed, length bounded.
pub fn sanitize_file_stem(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| !ILLEGAL_FILENAME_CHARS.contains(c) && !c.is_control())
        .collect();
    let collapsed = collapse_whitespace(&cleaned);
    let truncated: String = collapsed.chars().take(MAX_FILENAME_CHARS).collect();
    let stem = truncated.trim_end().trim_end_matches('.').to_string();
    if stem.is_empty() {
        "Untitled".to_string()
    } else {
        stem
    }
}

/// File stem for a book's note: `<author> - <title>`, sanitized.
pub fn document_stem(book: &Book) -> String {
    sanitize_file_stem(&format!("{} - {}", book.author, book.title))
}

pub fn document_filename(book: &Book) -> String {
    format!("{}.md", document_stem(book))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::{enrich_book, ColorTagMap, EnrichOptions};

    fn ctx() -> RenderContext<'static> {
        RenderContext {
            today: NaiveDate::from_ymd_opt(2026, 1, 25).unwrap(),
            import_source: "local",
            src_path: "/exports/dune.json",
        }
    }

    fn sample_book() -> Book {
        let highlights = vec![
            Highlight {
                text: "Fear is the mind-killer.\nFear is the little-death.".into(),
                note: Some("Litany #fear".into()),
                color: Some("Yellow".into()),
                page: Some(12),
                location: "345".into(),
                created: Some("2024-03-01T10:00:00Z".into()),
                chapter: Some("Chapter  1".into()),
                ..Default::default()
            },
            Highlight {
                text: String::new(),
                ..Default::default()
            },
        ];
        let mut book = Book::new("Dune", "Frank  Herbert", None, highlights);
        let options = EnrichOptions {
            color_tags: ColorTagMap::new([("yellow", vec!["hl/insight"])]),
            apply_color_tags: true,
        };
        enrich_book(&mut book, &options);
        book
    }

    #[test]
    fn test_render_book_full_document() {
        let rendered = render_book(&sample_book(), &ctx());

        let expected = "\
---
title: \"Dune\"
author: \"Frank  Herbert\"
source: \"KOReader\"
updated: \"2026-01-25\"
tags: [\"fear\", \"highlights\", \"hl/insight\", \"koreader\"]
koreader:
  import_source: \"local\"
  src_path: \"/exports/dune.json\"
  counts:
    highlights: 2
    notes: 1
---

# Dune - Frank Herbert

## Highlight 1
*Page 12 | Chapter 1 | Location 345 | 2024-03-01 | yellow | #hl/insight*
> Fear is the mind-killer.
> Fear is the little-death.

**Note:** Litany #fear

---

## Highlight 2
> \n";
        assert_eq!(rendered, expected);
    }

    #[test]
    fn test_render_is_deterministic() {
        let book = sample_book();

        assert_eq!(render_book(&book, &ctx()), render_book(&book, &ctx()));
    }

    #[test]
    fn test_render_empty_book() {
        let rendered = render_book(&Book::empty(), &ctx());

        assert!(rendered.ends_with("---\n\n# Unknown - Unknown\n"));
        assert!(rendered.contains("    highlights: 0\n    notes: 0\n"));
    }

    #[test]
    fn test_escape_scalar() {
        assert_eq!(escape_scalar(r#"a "b" \c"#), r#"a \"b\" \\c"#);
        assert_eq!(escape_scalar("line\nbreak\ttab"), "line\\nbreak\\ttab");
        assert_eq!(escape_scalar("bell\u{7}"), "bell\\u0007");
    }

    #[test]
    fn test_titles_with_quotes_are_escaped_in_front_matter() {
        let book = Book::new("The \"Best\" Book", "A\\B", None, Vec::new());

        let rendered = render_book(&book, &ctx());

        assert!(rendered.contains("title: \"The \\\"Best\\\" Book\"\n"));
        assert!(rendered.contains("author: \"A\\\\B\"\n"));
    }

    #[test]
    fn test_render_collection_combines_books() {
        let books = vec![
            Book::new("One", "Ann", None, vec![Highlight { text: "a".into(), ..Default::default() }]),
            Book::new("Two", "Ann", None, vec![Highlight { text: "b".into(), ..Default::default() }]),
        ];

        let rendered = render_collection("export", &books, &ctx());

        assert!(rendered.contains("title: \"export\"\n"));
        assert!(rendered.contains("author: \"Ann\"\n"));
        assert!(rendered.contains("    highlights: 2\n"));
        assert!(rendered.contains("# One - Ann\n\n## Highlight 1\n> a\n\n# Two - Ann\n\n## Highlight 1\n> b\n"));
    }

    #[test]
    fn test_document_filename() {
        let book = Book::new("What? A: <Story>", "Jane   \"JD\" Doe", None, Vec::new());

        assert_eq!(document_filename(&book), "Jane JD Doe - What A Story.md");
    }

    #[test]
    fn test_document_filename_is_bounded() {
        let book = Book::new(&"x".repeat(500), "A", None, Vec::new());

        let name = document_filename(&book);

        assert_eq!(name.chars().count(), MAX_FILENAME_CHARS + ".md".len());
    }

    #[test]
    fn test_sanitize_empty_stem() {
        assert_eq!(sanitize_file_stem("???"), "Untitled");
    }
}
