use super::to_plain_text;
use crate::posts::ContentBlock;

pub const WORDS_PER_MINUTE: u32 = 200;

/// Estimated reading time in whole minutes at [`WORDS_PER_MINUTE`].
pub fn estimate_minutes(content: &[ContentBlock]) -> u32 {
    estimate_minutes_at(content, WORDS_PER_MINUTE)
}

/// Estimated reading time in whole minutes.
///
/// Only block bodies are counted. An empty block sequence is 0 minutes; any
/// other content is at least 1 minute.
pub fn estimate_minutes_at(content: &[ContentBlock], words_per_minute: u32) -> u32 {
    if content.is_empty() {
        return 0;
    }

    let words = count_words(content);
    let rate = words_per_minute.max(1) as usize;
    words.div_ceil(rate).max(1) as u32
}

pub fn count_words(content: &[ContentBlock]) -> usize {
    content
        .iter()
        .map(|block| to_plain_text(&block.body))
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .count()
}
