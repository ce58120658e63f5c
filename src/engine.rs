//! Query engine: load the persisted index, retrieve, and answer.
//!
//! Each [`QueryEngine`] wraps one generation of the index. After a rebuild
//! the server swaps in a freshly loaded engine rather than mutating the old
//! one; `answer` calls are stateless and independent, with no conversation
//! memory.
//!
//! Loading enforces embedding-space consistency: the index records which
//! model produced its vectors, and a mismatch with the configured model is
//! an error, because similarity scores across models are meaningless.

use anyhow::{bail, Result};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

use crate::config::Config;
use crate::db;
use crate::embedding::{blob_to_vec, cosine_similarity, EmbeddingClient};
use crate::index;
use crate::llm::ChatClient;
use crate::models::{Answer, RetrievedChunk};

pub struct QueryEngine {
    pool: SqlitePool,
    embedder: Arc<EmbeddingClient>,
    chat: Arc<ChatClient>,
    top_k: usize,
}

/// A stored chunk with its decoded vector, ready for scoring.
struct Candidate {
    chunk_id: String,
    filename: String,
    chunk_index: i64,
    text: String,
    embedding: Vec<f32>,
}

impl QueryEngine {
    /// Load the engine from the persisted index.
    ///
    /// Returns `Ok(None)` when no index exists yet, the normal state before
    /// the first upload, which callers report as "not ready" rather than as
    /// a failure. A present-but-unreadable or model-mismatched index is an
    /// error.
    pub async fn load(
        config: &Config,
        embedder: Arc<EmbeddingClient>,
        chat: Arc<ChatClient>,
    ) -> Result<Option<Self>> {
        let path = config.index_path();
        if !path.exists() {
            return Ok(None);
        }

        let pool = db::open_existing(&path).await?;

        let built_with = index::read_meta(&pool, index::META_EMBEDDING_MODEL).await?;
        match built_with {
            None => {
                pool.close().await;
                bail!(
                    "Index at {} records no embedding model; rebuild it",
                    path.display()
                );
            }
            Some(model) if model != embedder.model_name() => {
                pool.close().await;
                bail!(
                    "Index was built with embedding model '{}' but '{}' is configured; rebuild the index",
                    model,
                    embedder.model_name()
                );
            }
            Some(_) => {}
        }

        Ok(Some(Self {
            pool,
            embedder,
            chat,
            top_k: config.retrieval.top_k,
        }))
    }

    /// Retrieve the top-K chunks most similar to the question.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<RetrievedChunk>> {
        let query_vec = self.embedder.embed_query(question).await?;

        let rows = sqlx::query(
            r#"
            SELECT cv.chunk_id, c.filename, c.chunk_index, c.text, cv.embedding
            FROM chunk_vectors cv
            JOIN chunks c ON c.id = cv.chunk_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let candidates: Vec<Candidate> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                Candidate {
                    chunk_id: row.get("chunk_id"),
                    filename: row.get("filename"),
                    chunk_index: row.get("chunk_index"),
                    text: row.get("text"),
                    embedding: blob_to_vec(&blob),
                }
            })
            .collect();

        Ok(rank_candidates(&query_vec, candidates, self.top_k))
    }

    /// Answer a question from the indexed documents.
    ///
    /// Embeds the question, retrieves context, assembles the prompt, and
    /// requests one completion. The returned [`Answer`] carries the matched
    /// chunks; HTTP callers discard them, the CLI prints them.
    pub async fn answer(&self, question: &str) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            bail!("question must not be empty");
        }

        let sources = self.retrieve(question).await?;
        let prompt = build_prompt(&sources, question);
        let reply = self.chat.complete(&prompt).await?;

        Ok(Answer { reply, sources })
    }
}

/// Score candidates against the query vector and keep the top K,
/// deterministically ordered (score desc, then chunk id).
fn rank_candidates(
    query_vec: &[f32],
    candidates: Vec<Candidate>,
    top_k: usize,
) -> Vec<RetrievedChunk> {
    let mut scored: Vec<RetrievedChunk> = candidates
        .into_iter()
        .map(|c| {
            let score = cosine_similarity(query_vec, &c.embedding);
            RetrievedChunk {
                chunk_id: c.chunk_id,
                filename: c.filename,
                chunk_index: c.chunk_index,
                text: c.text,
                score,
            }
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
    scored.truncate(top_k);
    scored
}

/// Assemble a stuff-style prompt: retrieved passages first, then the
/// question, with an instruction to admit ignorance over inventing answers.
pub fn build_prompt(context: &[RetrievedChunk], question: &str) -> String {
    let mut prompt = String::from(
        "Use the following pieces of context to answer the question at the end. \
         If you don't know the answer, just say that you don't know, don't try \
         to make up an answer.\n\n",
    );

    for chunk in context {
        prompt.push_str(&chunk.text);
        prompt.push_str("\n\n");
    }

    prompt.push_str("Question: ");
    prompt.push_str(question);
    prompt.push_str("\nHelpful Answer:");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, text: &str, embedding: Vec<f32>) -> Candidate {
        Candidate {
            chunk_id: id.to_string(),
            filename: "doc.pdf".to_string(),
            chunk_index: 0,
            text: text.to_string(),
            embedding,
        }
    }

    #[test]
    fn rank_orders_by_similarity() {
        let query = vec![1.0, 0.0];
        let candidates = vec![
            candidate("far", "far", vec![0.0, 1.0]),
            candidate("near", "near", vec![1.0, 0.1]),
            candidate("mid", "mid", vec![0.5, 0.5]),
        ];
        let ranked = rank_candidates(&query, candidates, 3);
        assert_eq!(ranked[0].chunk_id, "near");
        assert_eq!(ranked[1].chunk_id, "mid");
        assert_eq!(ranked[2].chunk_id, "far");
    }

    #[test]
    fn rank_truncates_to_top_k() {
        let query = vec![1.0, 0.0];
        let candidates = (0..10)
            .map(|i| candidate(&format!("c{}", i), "t", vec![1.0, i as f32]))
            .collect();
        let ranked = rank_candidates(&query, candidates, 3);
        assert_eq!(ranked.len(), 3);
    }

    #[test]
    fn rank_breaks_ties_by_chunk_id() {
        let query = vec![1.0, 0.0];
        let candidates = vec![
            candidate("b", "b", vec![1.0, 0.0]),
            candidate("a", "a", vec![1.0, 0.0]),
        ];
        let ranked = rank_candidates(&query, candidates, 2);
        assert_eq!(ranked[0].chunk_id, "a");
        assert_eq!(ranked[1].chunk_id, "b");
    }

    #[test]
    fn rank_empty_index_yields_nothing() {
        let ranked = rank_candidates(&[1.0, 0.0], Vec::new(), 3);
        assert!(ranked.is_empty());
    }

    #[test]
    fn prompt_places_context_before_question() {
        let context = vec![RetrievedChunk {
            chunk_id: "c1".to_string(),
            filename: "policy.pdf".to_string(),
            chunk_index: 0,
            text: "Refunds are processed within 14 days.".to_string(),
            score: 0.9,
        }];
        let prompt = build_prompt(&context, "How long do refunds take?");

        let context_pos = prompt.find("14 days").unwrap();
        let question_pos = prompt.find("How long do refunds take?").unwrap();
        assert!(context_pos < question_pos);
        assert!(prompt.ends_with("Helpful Answer:"));
    }

    #[test]
    fn prompt_without_context_still_asks() {
        let prompt = build_prompt(&[], "Anything?");
        assert!(prompt.contains("Question: Anything?"));
    }
}
