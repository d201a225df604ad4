use crate::foundation::error::{ReelError, ReelResult};

/// One whitespace-delimited token of the narration text.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct Word {
    /// 0-based position in narration order.
    pub index: usize,
    /// Token text, punctuation included.
    pub text: String,
}

/// Words in narration order plus the uniform per-word display duration.
///
/// Every word gets `total / word_count` seconds; there is no weighting by word length.
#[derive(Clone, Debug, PartialEq)]
pub struct WordTimeline {
    words: Vec<Word>,
    word_duration_secs: f64,
    total_duration_secs: f64,
}

impl WordTimeline {
    /// Split `text` on whitespace and spread `total_duration_secs` evenly across the words.
    pub fn new(text: &str, total_duration_secs: f64) -> ReelResult<Self> {
        if !total_duration_secs.is_finite() || total_duration_secs <= 0.0 {
            return Err(ReelError::invalid_input(format!(
                "narration duration must be finite and > 0, got {total_duration_secs}"
            )));
        }

        let words: Vec<Word> = segment_words(text);
        if words.is_empty() {
            return Err(ReelError::invalid_input(
                "text contains no words (empty or whitespace-only)",
            ));
        }

        let word_duration_secs = total_duration_secs / words.len() as f64;
        tracing::debug!(
            words = words.len(),
            total_duration_secs,
            word_duration_secs,
            "derived word timeline"
        );

        Ok(Self {
            words,
            word_duration_secs,
            total_duration_secs,
        })
    }

    /// Words in narration order.
    pub fn words(&self) -> &[Word] {
        &self.words
    }

    /// Number of words.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// `true` when there are no words.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Display duration shared by every word.
    pub fn word_duration_secs(&self) -> f64 {
        self.word_duration_secs
    }

    /// Measured narration duration the timeline was derived from.
    pub fn total_duration_secs(&self) -> f64 {
        self.total_duration_secs
    }

    /// Per-word durations in narration order.
    pub fn durations(&self) -> impl ExactSizeIterator<Item = f64> + '_ {
        self.words.iter().map(|_| self.word_duration_secs)
    }

    /// Start time of word `index` in seconds.
    pub fn start_secs(&self, index: usize) -> f64 {
        index as f64 * self.word_duration_secs
    }
}

/// Split on any Unicode whitespace, dropping empty segments.
pub fn segment_words(text: &str) -> Vec<Word> {
    text.split_whitespace()
        .enumerate()
        .map(|(index, w)| Word {
            index,
            text: w.to_string(),
        })
        .collect()
}
