//! Document splitting strategies.
//!
//! This module provides the [`Splitter`] trait and two implementations:
//!
//! - [`RecursiveSplitter`]: splits hierarchically by paragraphs, lines,
//!   sentences, then words, carrying a character overlap into the next chunk
//! - [`FixedSizeSplitter`]: splits by character count with an exact overlap
//!
//! Sizes are measured in characters, not bytes.

use crate::config::RagConfig;
use crate::document::{CHUNK_INDEX_KEY, Document};
use crate::error::{RagError, Result};

/// A strategy for splitting loaded documents into chunks.
///
/// Every produced chunk carries all metadata of the document it came from
/// plus a `chunk_index` entry.
pub trait Splitter: Send + Sync {
    /// Split documents into chunks, in input order.
    ///
    /// Documents with empty or whitespace-only content produce no chunks.
    fn split(&self, documents: Vec<Document>) -> Result<Vec<Document>>;
}

fn validate(chunk_size: usize, chunk_overlap: usize) -> Result<()> {
    if chunk_size == 0 || chunk_overlap >= chunk_size {
        return Err(RagError::ChunkingError(format!(
            "chunk_overlap ({chunk_overlap}) must be less than a non-zero chunk_size ({chunk_size})"
        )));
    }
    Ok(())
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Wrap raw chunk texts as documents inheriting `parent`'s metadata.
fn to_chunks(parent: &Document, pieces: Vec<String>) -> impl Iterator<Item = Document> + '_ {
    pieces.into_iter().enumerate().map(move |(i, content)| {
        let mut metadata = parent.metadata.clone();
        metadata.insert(CHUNK_INDEX_KEY.to_string(), i.into());
        Document { content, metadata }
    })
}

/// Splits text into fixed-size character windows.
///
/// Consecutive chunks share exactly `chunk_overlap` characters; only the last
/// chunk of a document may be shorter than `chunk_size`.
///
/// # Example
///
/// ```rust,ignore
/// use ragline::FixedSizeSplitter;
///
/// let splitter = FixedSizeSplitter::new(256, 32);
/// let chunks = splitter.split(documents)?;
/// ```
#[derive(Debug, Clone)]
pub struct FixedSizeSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeSplitter {
    /// Create a new `FixedSizeSplitter`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size`: maximum number of characters per chunk
    /// * `chunk_overlap`: number of characters shared by consecutive chunks
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size, chunk_overlap }
    }
}

impl Splitter for FixedSizeSplitter {
    fn split(&self, documents: Vec<Document>) -> Result<Vec<Document>> {
        validate(self.chunk_size, self.chunk_overlap)?;
        let mut chunks = Vec::new();
        for document in &documents {
            if document.content.trim().is_empty() {
                continue;
            }
            let pieces = split_by_size(&document.content, self.chunk_size, self.chunk_overlap);
            chunks.extend(to_chunks(document, pieces));
        }
        Ok(chunks)
    }
}

/// Character windows of `chunk_size` advancing by `chunk_size - chunk_overlap`.
fn split_by_size(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let step = chunk_size - chunk_overlap;
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }

    chunks
}

/// Separators tried in order, coarsest first.
const SEPARATORS: [&str; 6] = ["\n\n", "\n", ". ", "! ", "? ", " "];

/// Splits text hierarchically: paragraphs, lines, sentences, then words.
///
/// Text is cut at the coarsest separator it contains into pieces of at most
/// `chunk_size - chunk_overlap` characters; pieces still too long are cut
/// with the next separator, and text with no separator left falls back to
/// character windows. Pieces are then packed into chunks of at most
/// `chunk_size` characters. Every chunk after the first starts with the last
/// `chunk_overlap` characters of the chunk before it, so consecutive chunks
/// share at least that much text.
///
/// # Example
///
/// ```rust,ignore
/// use ragline::RecursiveSplitter;
///
/// let splitter = RecursiveSplitter::new(1000, 100);
/// let chunks = splitter.split(documents)?;
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveSplitter {
    /// Create a new `RecursiveSplitter`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size`: maximum number of characters per chunk
    /// * `chunk_overlap`: characters carried over between consecutive chunks
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size, chunk_overlap }
    }

    /// Create a splitter using the chunk parameters of `config`.
    pub fn from_config(config: &RagConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    fn split_text(&self, text: &str) -> Vec<String> {
        if char_len(text) <= self.chunk_size {
            let trimmed = text.trim();
            return if trimmed.is_empty() { Vec::new() } else { vec![trimmed.to_string()] };
        }

        let mut pieces = Vec::new();
        split_pieces(text, self.chunk_size - self.chunk_overlap, &SEPARATORS, &mut pieces);
        merge_pieces(&pieces, self.chunk_size, self.chunk_overlap)
    }
}

impl Splitter for RecursiveSplitter {
    fn split(&self, documents: Vec<Document>) -> Result<Vec<Document>> {
        validate(self.chunk_size, self.chunk_overlap)?;
        let mut chunks = Vec::new();
        for document in &documents {
            let pieces = self.split_text(&document.content);
            chunks.extend(to_chunks(document, pieces));
        }
        Ok(chunks)
    }
}

/// Cut `text` into pieces of at most `limit` characters at the coarsest
/// separator that works.
fn split_pieces<'a>(text: &'a str, limit: usize, separators: &[&str], out: &mut Vec<&'a str>) {
    if char_len(text) <= limit {
        out.push(text);
        return;
    }

    let Some(position) = separators.iter().position(|s| text.contains(s)) else {
        out.extend(char_windows(text, limit));
        return;
    };
    let finer = &separators[position + 1..];
    for segment in split_keeping_separator(text, separators[position]) {
        split_pieces(segment, limit, finer, out);
    }
}

/// Pack pieces into chunks of at most `chunk_size` characters, starting each
/// new chunk with the last `chunk_overlap` characters of the previous one.
fn merge_pieces(pieces: &[&str], chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    let mut carried = String::new();
    // Whether `current` holds text beyond the carried overlap.
    let mut fresh = false;

    for &piece in pieces {
        let len = char_len(piece);
        if current_len + len > chunk_size {
            if fresh {
                let chunk = finish_chunk(&current, chunks.is_empty());
                carried = char_tail(&chunk, chunk_overlap).to_string();
                let gap = current[current.trim_end().len()..].to_string();
                current = carried.clone();
                if !carried.is_empty() && char_len(&carried) + char_len(&gap) + len <= chunk_size {
                    current.push_str(&gap);
                }
                chunks.push(chunk);
                fresh = false;
            } else {
                current = carried.clone();
            }
            current_len = char_len(&current);
        }
        current.push_str(piece);
        current_len += len;
        fresh |= !piece.trim().is_empty();
    }

    if fresh {
        let chunk = finish_chunk(&current, chunks.is_empty());
        chunks.push(chunk);
    }
    chunks
}

/// The first chunk drops leading whitespace; later chunks keep their
/// carried prefix intact.
fn finish_chunk(text: &str, first: bool) -> String {
    if first { text.trim() } else { text.trim_end() }.to_string()
}

/// The last `n` characters of `text`.
fn char_tail(text: &str, n: usize) -> &str {
    let skip = char_len(text).saturating_sub(n);
    text.char_indices().nth(skip).map_or("", |(i, _)| &text[i..])
}

/// Non-overlapping windows of `limit` characters.
fn char_windows(text: &str, limit: usize) -> Vec<&str> {
    let mut windows = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (i, _) in text.char_indices() {
        if count == limit {
            windows.push(&text[start..i]);
            start = i;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        windows.push(&text[start..]);
    }
    windows
}

/// Split text at a separator while keeping the separator attached to the preceding segment.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut result = Vec::new();
    let mut start = 0;

    while let Some(pos) = text[start..].find(separator) {
        let end = start + pos + separator.len();
        result.push(&text[start..end]);
        start = end;
    }

    if start < text.len() {
        result.push(&text[start..]);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{MetadataValue, SOURCE_KEY};

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("word{i}")).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn fixed_windows_share_exact_overlap() {
        let splitter = FixedSizeSplitter::new(4, 1);
        let chunks = splitter.split(vec![Document::new("abcdefghij")]).unwrap();
        let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(texts, ["abcd", "defg", "ghij"]);
    }

    #[test]
    fn fixed_windows_respect_char_boundaries() {
        let splitter = FixedSizeSplitter::new(2, 0);
        let chunks = splitter.split(vec![Document::new("ééééé")]).unwrap();
        let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(texts, ["éé", "éé", "é"]);
    }

    #[test]
    fn recursive_chunks_fit_and_cover_all_words() {
        let text = words(200);
        let splitter = RecursiveSplitter::new(60, 15);
        let chunks = splitter.split(vec![Document::new(text.clone())]).unwrap();

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.content.chars().count() <= 60, "chunk too long: {}", chunk.content);
        }
        for word in text.split(' ') {
            assert!(chunks.iter().any(|c| c.content.split(' ').any(|w| w == word)));
        }
    }

    fn assert_carries_overlap(chunks: &[Document], overlap: usize) {
        for pair in chunks.windows(2) {
            let tail = char_tail(&pair[0].content, overlap);
            assert_eq!(tail.chars().count(), overlap);
            assert!(
                pair[1].content.starts_with(tail),
                "'{}' does not start with the end of the previous chunk '{}'",
                pair[1].content,
                tail
            );
        }
    }

    #[test]
    fn recursive_carries_overlap_between_chunks() {
        let splitter = RecursiveSplitter::new(40, 12);
        let chunks = splitter.split(vec![Document::new(words(40))]).unwrap();

        assert!(chunks.len() > 2);
        assert_carries_overlap(&chunks, 12);
    }

    #[test]
    fn recursive_overlap_spans_paragraph_boundaries() {
        let paragraphs: Vec<String> = (0..5)
            .map(|p| (0..50).map(|w| format!("p{p}w{w:02}")).collect::<Vec<_>>().join(" "))
            .collect();
        let text = paragraphs.join("\n\n");
        let chunks = RecursiveSplitter::new(1000, 100).split(vec![Document::new(text)]).unwrap();

        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(chunk.content.chars().count() <= 1000);
        }
        assert_carries_overlap(&chunks, 100);
        assert!(chunks.last().unwrap().content.ends_with("p4w49"));
    }

    #[test]
    fn recursive_overlap_survives_character_fallback() {
        let alphabet = Document::new("abcdefghijklmnopqrstuvwxyz");
        let chunks = RecursiveSplitter::new(10, 3).split(vec![alphabet]).unwrap();

        for chunk in &chunks {
            assert!(chunk.content.chars().count() <= 10);
        }
        assert_carries_overlap(&chunks, 3);
        assert!(chunks.last().unwrap().content.ends_with('z'));
    }

    #[test]
    fn recursive_prefers_paragraph_boundaries() {
        let text = format!("{}\n\n{}", "a".repeat(30), "b".repeat(30));
        let chunks = RecursiveSplitter::new(40, 0).split(vec![Document::new(text)]).unwrap();
        let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(texts, ["a".repeat(30), "b".repeat(30)]);
    }

    #[test]
    fn metadata_is_forwarded_with_chunk_index() {
        let doc =
            Document::new(words(50)).with_metadata(SOURCE_KEY, "a.txt").with_metadata("lang", "en");
        let chunks = RecursiveSplitter::new(50, 10).split(vec![doc]).unwrap();

        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.source(), Some("a.txt"));
            assert_eq!(chunk.metadata.get("lang").and_then(MetadataValue::as_str), Some("en"));
            assert_eq!(chunk.metadata.get(CHUNK_INDEX_KEY), Some(&MetadataValue::Number(i as f64)));
        }
    }

    #[test]
    fn blank_documents_produce_no_chunks() {
        let chunks = RecursiveSplitter::new(10, 2)
            .split(vec![Document::new(""), Document::new("  \n\n ")])
            .unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn invalid_sizes_are_rejected() {
        let err = RecursiveSplitter::new(10, 10).split(vec![Document::new("x")]).unwrap_err();
        assert!(matches!(err, RagError::ChunkingError(_)));
        assert!(FixedSizeSplitter::new(0, 0).split(vec![]).is_err());
    }
}
