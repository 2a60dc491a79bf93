//! Sliding-window text chunker.
//!
//! Splits document text into overlapping windows of at most `chunk_chars`
//! characters, advancing by `chunk_chars - overlap` each step. The cut point
//! prefers a whitespace boundary within a small lookback of the window edge
//! so words are not severed; if none is found the cut is a hard one.
//!
//! Offsets are character positions, so multi-byte text (the corpus is
//! Portuguese) slices safely. Chunking is pure and deterministic: identical
//! `(text, chunk_chars, overlap)` always yields an identical sequence.

use crate::models::{Chunk, Document};

/// How far back from the window edge to look for a whitespace boundary.
/// Capped so the window always advances past the overlap region.
fn boundary_lookback(chunk_chars: usize, overlap: usize) -> usize {
    let stride = chunk_chars - overlap;
    (chunk_chars / 8).min(stride.saturating_sub(1))
}

/// Chunk a single document. `seq_base` is the corpus-wide sequence number of
/// the document's first chunk.
///
/// Callers must have validated `overlap < chunk_chars` (config validation
/// rejects anything else); this function debug-asserts it.
pub fn chunk_document(
    doc: &Document,
    chunk_chars: usize,
    overlap: usize,
    seq_base: usize,
) -> Vec<Chunk> {
    debug_assert!(overlap < chunk_chars);

    let chars: Vec<char> = doc.text.chars().collect();
    let total = chars.len();
    if total == 0 {
        return Vec::new();
    }

    let lookback = boundary_lookback(chunk_chars, overlap);
    let mut chunks = Vec::new();
    let mut start = 0usize;

    loop {
        let hard_end = (start + chunk_chars).min(total);
        let end = if hard_end < total {
            adjust_to_boundary(&chars, hard_end, lookback)
        } else {
            total
        };

        chunks.push(Chunk {
            document_id: doc.id.clone(),
            title: doc.title.clone(),
            seq: seq_base + chunks.len(),
            start,
            end,
            text: chars[start..end].iter().collect(),
        });

        if end >= total {
            break;
        }
        // Overlap is measured back from the (possibly adjusted) cut point.
        start = end - overlap;
    }

    chunks
}

/// Chunk a whole corpus in document order, assigning corpus-wide sequence
/// numbers. Empty-text documents produce no chunks.
pub fn chunk_corpus(docs: &[Document], chunk_chars: usize, overlap: usize) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    for doc in docs {
        let doc_chunks = chunk_document(doc, chunk_chars, overlap, chunks.len());
        chunks.extend(doc_chunks);
    }
    chunks
}

/// Move a prospective cut point back to just after the nearest whitespace
/// within `lookback` characters, if the cut would otherwise land inside a
/// word. Returns the original point when no boundary is found.
fn adjust_to_boundary(chars: &[char], hard_end: usize, lookback: usize) -> usize {
    if lookback == 0 {
        return hard_end;
    }
    // Already at a word edge: either side of the cut is whitespace.
    if chars[hard_end].is_whitespace() || chars[hard_end - 1].is_whitespace() {
        return hard_end;
    }
    let floor = hard_end - lookback;
    for i in (floor..hard_end).rev() {
        if chars[i].is_whitespace() {
            return i + 1;
        }
    }
    hard_end
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> Document {
        Document {
            id: "doc1".to_string(),
            title: "doc1.json".to_string(),
            source_url: None,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = chunk_document(&doc("Hello, world!"), 700, 80, 0);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].seq, 0);
        assert_eq!(chunks[0].text, "Hello, world!");
        assert_eq!((chunks[0].start, chunks[0].end), (0, 13));
    }

    #[test]
    fn test_empty_text_no_chunks() {
        let chunks = chunk_document(&doc(""), 700, 80, 0);
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_chunks_respect_max_length() {
        let text = "palavra ".repeat(300);
        let chunks = chunk_document(&doc(&text), 100, 20, 0);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.text.chars().count() <= 100, "chunk too long: {}", c.text.len());
        }
    }

    #[test]
    fn test_full_coverage_no_gaps() {
        let text = "O Programa Farmácia Popular oferece medicamentos gratuitos. ".repeat(20);
        let total = text.chars().count();
        let chunks = chunk_document(&doc(&text), 120, 30, 0);

        assert_eq!(chunks[0].start, 0);
        assert_eq!(chunks.last().unwrap().end, total);
        for pair in chunks.windows(2) {
            // Next chunk starts inside the previous one (overlap, never a gap).
            assert!(pair[1].start < pair[0].end);
            assert_eq!(pair[1].start, pair[0].end - 30);
        }
    }

    #[test]
    fn test_prefers_word_boundaries() {
        let text = "um dois tres quatro cinco seis sete oito nove dez onze doze treze".repeat(3);
        let chunks = chunk_document(&doc(&text), 40, 8, 0);
        for c in &chunks[..chunks.len() - 1] {
            let last = c.text.chars().last().unwrap();
            let chars: Vec<char> = text.chars().collect();
            // Either the cut landed after whitespace or the next char starts
            // a new word; a mid-word cut would fail both.
            assert!(
                last.is_whitespace() || chars[c.end].is_whitespace() || c.end - c.start == 40,
                "severed word at chunk ending {:?}",
                c.text
            );
        }
    }

    #[test]
    fn test_hard_cut_when_no_boundary() {
        // A single unbroken token longer than the window forces hard cuts.
        let text = "x".repeat(500);
        let chunks = chunk_document(&doc(&text), 100, 10, 0);
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            assert_eq!(pair[1].start, pair[0].end - 10);
        }
        assert_eq!(chunks.last().unwrap().end, 500);
    }

    #[test]
    fn test_deterministic() {
        let text = "O programa funciona em duas modalidades. ".repeat(30);
        let a = chunk_document(&doc(&text), 90, 15, 0);
        let b = chunk_document(&doc(&text), 90, 15, 0);
        assert_eq!(a, b);
    }

    #[test]
    fn test_multibyte_offsets_are_char_based() {
        let text = "ação não há saúde única décima".repeat(10);
        let chunks = chunk_document(&doc(&text), 50, 10, 0);
        let chars: Vec<char> = text.chars().collect();
        for c in &chunks {
            let expect: String = chars[c.start..c.end].iter().collect();
            assert_eq!(c.text, expect);
        }
    }

    #[test]
    fn test_corpus_sequence_is_global() {
        let docs = vec![doc(&"a ".repeat(100)), {
            let mut d = doc(&"b ".repeat(100));
            d.id = "doc2".to_string();
            d
        }];
        let chunks = chunk_corpus(&docs, 50, 10);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.seq, i);
        }
        assert!(chunks.iter().any(|c| c.document_id == "doc2"));
    }

    #[test]
    fn test_overlap_carries_sentence_tail() {
        let text =
            "O Programa Farmácia Popular oferece medicamentos gratuitos para hipertensão e diabetes.";
        let chunks = chunk_document(&doc(text), 50, 10, 0);
        assert!(chunks.len() >= 2);
        assert!(chunks.iter().any(|c| c.text.contains("hipertensão e diabetes")));
        assert!(chunks[1].start < chunks[0].end);
    }
}
