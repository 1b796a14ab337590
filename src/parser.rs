use crate::error::ParseError;
use crate::models::{Book, Highlight, UNKNOWN};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortMode {
    #[default]
    Page,
    Time,
}

/// The two export layouts we understand, resolved once at the parser boundary.
#[derive(Debug)]
enum RawExport {
    Classic(ClassicExport),
    Grouped(GroupedExport),
    Unrecognized,
}

/// Members stay as raw values so one malformed record cannot sink the rest.
#[derive(Debug, Deserialize)]
struct ClassicExport {
    #[serde(default)]
    book: Option<Value>,
    highlights: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct ClassicBook {
    #[serde(default)]
    title: Option<Scalar>,
    #[serde(default, alias = "authors")]
    author: Option<Authors>,
    #[serde(default)]
    uid: Option<Scalar>,
}

#[derive(Debug, Deserialize)]
struct GroupedExport {
    entries: Vec<Value>,
    #[serde(default)]
    files: Option<Value>,
}

/// Per-file metadata; only used to backfill missing authors.
#[derive(Debug, Deserialize)]
struct FileMetadata {
    #[serde(default)]
    title: Option<Scalar>,
    #[serde(default)]
    author: Option<Authors>,
}

/// One highlight record; the classic and grouped layouts share field names,
/// except `created` (classic) versus `time` (grouped).
#[derive(Debug, Default, Deserialize)]
struct RawHighlight {
    #[serde(default)]
    text: Option<Scalar>,
    #[serde(default)]
    note: Option<Scalar>,
    #[serde(default)]
    color: Option<Scalar>,
    #[serde(default)]
    page: Option<Scalar>,
    #[serde(default)]
    chapter: Option<Scalar>,
    #[serde(default)]
    location: Option<Scalar>,
    #[serde(default, alias = "time")]
    created: Option<Scalar>,
    #[serde(default)]
    book: Option<Scalar>,
    #[serde(default)]
    author: Option<Authors>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Number(serde_json::Number),
    Bool(bool),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Authors {
    One(Scalar),
    Many(Vec<Scalar>),
}

impl Scalar {
    fn into_string(self) -> String {
        match self {
            Scalar::Text(s) => s,
            Scalar::Number(n) => n.to_string(),
            Scalar::Bool(b) => b.to_string(),
        }
    }

    fn as_page(&self) -> Option<i64> {
        match self {
            Scalar::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Scalar::Text(s) => s.trim().parse().ok(),
            Scalar::Bool(_) => None,
        }
    }

    /// Epoch seconds become an ISO-8601 instant; strings pass through.
    fn into_timestamp(self) -> Option<String> {
        match self {
            Scalar::Number(n) => {
                let secs = n.as_i64().or_else(|| n.as_f64().map(|f| f.floor() as i64))?;
                DateTime::<Utc>::from_timestamp(secs, 0)
                    .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
            }
            Scalar::Text(s) => {
                let s = s.trim();
                (!s.is_empty()).then(|| s.to_string())
            }
            Scalar::Bool(_) => None,
        }
    }
}

impl Authors {
    fn joined(self) -> String {
        match self {
            Authors::One(s) => s.into_string().trim().to_string(),
            Authors::Many(list) => list
                .into_iter()
                .map(|s| s.into_string().trim().to_string())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

impl RawExport {
    fn detect(value: Value) -> Self {
        let is_classic = value.get("highlights").is_some_and(Value::is_array);
        let is_grouped = value
            .get("entries")
            .and_then(Value::as_array)
            .is_some_and(|entries| !entries.is_empty());

        if is_classic {
            match serde_json::from_value(value) {
                Ok(export) => RawExport::Classic(export),
                Err(e) => {
                    warn!(error = %e, "Malformed classic export, treating as empty");
                    RawExport::Unrecognized
                }
            }
        } else if is_grouped {
            match serde_json::from_value(value) {
                Ok(export) => RawExport::Grouped(export),
                Err(e) => {
                    warn!(error = %e, "Malformed grouped export, treating as empty");
                    RawExport::Unrecognized
                }
            }
        } else {
            RawExport::Unrecognized
        }
    }
}

/// Parses one exported JSON document into books. Never returns an empty list.
pub fn parse_export(content: &str, source_file: &str) -> Result<Vec<Book>, ParseError> {
    let value: Value = serde_json::from_str(content).map_err(|e| ParseError::InvalidJson {
        file: source_file.to_string(),
        source: e,
    })?;

    let books = match RawExport::detect(value) {
        RawExport::Classic(export) => vec![classic_book(export, source_file)],
        RawExport::Grouped(export) => grouped_books(export, source_file),
        RawExport::Unrecognized => {
            debug!(file = %source_file, "No highlights found in export");
            vec![Book::empty()]
        }
    };

    Ok(books)
}

/// Decodes each member on its own, dropping (and logging) the ones that do not fit.
fn decode_members<T: DeserializeOwned>(items: Vec<Value>, what: &str, source_file: &str) -> Vec<T> {
    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!(file = %source_file, index, error = %e, "Skipping malformed {}", what);
                None
            }
        })
        .collect()
}

fn classic_book(export: ClassicExport, source_file: &str) -> Book {
    let meta: ClassicBook = match export.book {
        Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
            warn!(file = %source_file, error = %e, "Malformed book metadata, using defaults");
            ClassicBook::default()
        }),
        None => ClassicBook::default(),
    };
    let title = meta.title.map(Scalar::into_string).unwrap_or_default();
    let author = meta.author.map(Authors::joined).unwrap_or_default();
    let uid = meta.uid.map(Scalar::into_string);
    let highlights = decode_members::<RawHighlight>(export.highlights, "highlight", source_file)
        .into_iter()
        .map(into_highlight)
        .collect();

    Book::new(&title, &author, uid, highlights)
}

fn grouped_books(export: GroupedExport, source_file: &str) -> Vec<Book> {
    let file_values = match export.files {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    };
    let files: Vec<(String, String)> = decode_members::<FileMetadata>(file_values, "file entry", source_file)
        .into_iter()
        .filter_map(|f| {
            let title = f.title?.into_string().trim().to_string();
            let author = f.author?.joined();
            (!title.is_empty() && !author.is_empty()).then_some((title, author))
        })
        .collect();

    // Insertion-ordered groups keyed by (title, author).
    let mut groups: Vec<((String, String), Vec<Highlight>)> = Vec::new();

    for mut entry in decode_members::<RawHighlight>(export.entries, "entry", source_file) {
        let title = entry
            .book
            .take()
            .map(|t| t.into_string().trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| UNKNOWN.to_string());
        let author = entry
            .author
            .take()
            .map(Authors::joined)
            .filter(|a| !a.is_empty())
            .or_else(|| {
                files
                    .iter()
                    .find(|(file_title, _)| *file_title == title)
                    .map(|(_, author)| author.clone())
            })
            .unwrap_or_else(|| UNKNOWN.to_string());

        let highlight = into_highlight(entry);
        let key = (title, author);
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, highlights)) => highlights.push(highlight),
            None => groups.push((key, vec![highlight])),
        }
    }

    if groups.is_empty() {
        return vec![Book::empty()];
    }

    groups
        .into_iter()
        .map(|((title, author), highlights)| Book::new(&title, &author, None, highlights))
        .collect()
}

fn into_highlight(raw: RawHighlight) -> Highlight {
    Highlight {
        text: raw.text.map(Scalar::into_string).unwrap_or_default(),
        note: raw.note.map(Scalar::into_string),
        color: raw.color.map(Scalar::into_string),
        page: raw.page.as_ref().and_then(Scalar::as_page),
        location: raw.location.map(Scalar::into_string).unwrap_or_default(),
        created: raw.created.and_then(Scalar::into_timestamp),
        chapter: raw
            .chapter
            .map(|c| c.into_string().trim().to_string())
            .filter(|c| !c.is_empty()),
        ..Default::default()
    }
}

/// Parses the creation timestamps we know about: RFC 3339 instants,
/// KOReader's `YYYY-MM-DD HH:MM:SS` and bare dates.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt);
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Stable reorder of a book's highlights; entries missing the key go last.
pub fn sort_highlights(book: &mut Book, mode: SortMode) {
    match mode {
        SortMode::Page => book
            .highlights
            .sort_by_key(|h| (h.page.is_none(), h.page.unwrap_or_default())),
        SortMode::Time => book.highlights.sort_by_key(|h| {
            let ts = h.created.as_deref().and_then(parse_timestamp);
            (ts.is_none(), ts)
        }),
    }
}
