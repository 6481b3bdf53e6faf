pub mod config;
pub mod consumer;
pub mod producer;
pub mod rebalance;

pub const DEAD_LETTER_SUFFIX: &str = "-dlq";

/// Derives the dead-letter topic name for a consume topic.
pub fn dead_letter_topic(topic: &str) -> String {
    format!("{topic}{DEAD_LETTER_SUFFIX}")
}
