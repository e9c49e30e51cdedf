//! Simulated streaming of complete responses
//!
//! The service returns a finished answer; this module replays it as a paced
//! sequence of growing partial strings. Short answers are revealed one
//! character at a time, long answers one word at a time.

use async_trait::async_trait;
use futures::stream::{self, Stream};
use std::sync::Arc;
use std::time::Duration;

/// Chunking and pacing parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPolicy {
    /// Texts longer than this many characters are revealed word by word
    pub word_threshold: usize,
    /// Pause after each word chunk
    pub word_delay: Duration,
    /// Pause after each character chunk
    pub char_delay: Duration,
}

impl Default for ChunkPolicy {
    fn default() -> Self {
        Self {
            word_threshold: 200,
            word_delay: Duration::from_millis(30),
            char_delay: Duration::from_millis(15),
        }
    }
}

/// One increment of visible text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Text appended to the visible buffer
    pub text: String,
    /// Pause after the text is revealed
    pub delay: Duration,
}

/// Source of the inter-chunk pause
#[async_trait]
pub trait Pacer: Send + Sync {
    /// Wait for `delay`
    async fn pause(&self, delay: Duration);
}

/// Pacer backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioPacer;

#[async_trait]
impl Pacer for TokioPacer {
    async fn pause(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// Split a response into paced chunks
///
/// Above the threshold each chunk is one word plus the whitespace that follows
/// it, so the chunks concatenate back to the original text and their count
/// equals the word count. At or below the threshold each chunk is one
/// character.
///
/// # Examples
///
/// ```
/// use chatdeck::streaming::{plan_chunks, ChunkPolicy};
///
/// let policy = ChunkPolicy::default();
/// assert_eq!(plan_chunks("hey", &policy).len(), 3);
///
/// let long = "word ".repeat(60);
/// let chunks = plan_chunks(long.trim_end(), &policy);
/// assert_eq!(chunks.len(), 60);
/// ```
pub fn plan_chunks(text: &str, policy: &ChunkPolicy) -> Vec<Chunk> {
    if text.chars().count() > policy.word_threshold {
        word_chunks(text)
            .into_iter()
            .map(|text| Chunk {
                text,
                delay: policy.word_delay,
            })
            .collect()
    } else {
        text.chars()
            .map(|c| Chunk {
                text: c.to_string(),
                delay: policy.char_delay,
            })
            .collect()
    }
}

fn word_chunks(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut has_word = false;
    let mut after_space = false;

    for c in text.chars() {
        if c.is_whitespace() {
            after_space = true;
        } else {
            if has_word && after_space {
                chunks.push(std::mem::take(&mut current));
            }
            has_word = true;
            after_space = false;
        }
        current.push(c);
    }

    // Leading whitespace rides with the first word; whitespace-only text is one chunk.
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Replay `text` as a paced stream of cumulative partial strings
///
/// Each item is the full visible buffer after one more chunk. The pause for a
/// chunk happens after it is yielded, including the last one. The stream is
/// finite and cannot be restarted.
pub fn simulate(
    text: &str,
    policy: &ChunkPolicy,
    pacer: Arc<dyn Pacer>,
) -> impl Stream<Item = String> + Send + 'static {
    let chunks = plan_chunks(text, policy).into_iter();
    let initial = (chunks, String::new(), None::<Duration>, pacer);

    stream::unfold(
        initial,
        |(mut chunks, mut visible, pending, pacer)| async move {
            if let Some(delay) = pending {
                pacer.pause(delay).await;
            }
            let chunk = chunks.next()?;
            visible.push_str(&chunk.text);
            let item = visible.clone();
            Some((item, (chunks, visible, Some(chunk.delay), pacer)))
        },
    )
}
