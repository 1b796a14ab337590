//! Content-addressed labels for highlights.
//!
//! The id is a 32-bit FNV-1a hash, so two different highlights can share an id.
//! It is a stable label across runs, not a unique key.

use crate::models::Book;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// The uid when the export carries one, otherwise `<author>:<title>`.
pub fn book_key(book: &Book) -> String {
    match &book.uid {
        Some(uid) => uid.clone(),
        None => format!("{}:{}", book.author, book.title),
    }
}

pub fn highlight_id(book_key: &str, location: &str, text: &str) -> String {
    short_hash(&format!("{}::{}::{}", book_key, location, text))
}

/// Eight hex digit FNV-1a label for arbitrary text.
pub fn short_hash(input: &str) -> String {
    format!("{:08x}", fnv1a_utf16(input))
}

fn fnv1a_utf16(s: &str) -> u32 {
    s.encode_utf16().fold(FNV_OFFSET_BASIS, |hash, unit| {
        (hash ^ u32::from(unit)).wrapping_mul(FNV_PRIME)
    })
}
