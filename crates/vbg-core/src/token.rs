//! Token estimation for the session context budget
//!
//! Counts use tiktoken's cl100k_base encoding. The estimate only drives
//! eviction of old context entries, so approximate agreement with the
//! agents' own tokenizers is enough.

use std::sync::LazyLock;
use tiktoken_rs::{cl100k_base, CoreBPE};

/// Global tokenizer instance (initialized once, thread-safe)
static TOKENIZER: LazyLock<CoreBPE> = LazyLock::new(|| {
    cl100k_base().expect("cl100k_base tokenizer is a compile-time constant and should never fail")
});

/// Fixed cost of one context entry (role marker, command, separators)
pub const ENTRY_OVERHEAD: usize = 4;

/// Token counter backed by the global tokenizer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenCounter;

impl TokenCounter {
    /// Create a new token counter
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Count tokens in a string
    #[must_use]
    pub fn count_tokens(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        TOKENIZER.encode_with_special_tokens(text).len()
    }

    /// Estimated cost of a context entry with this content
    #[must_use]
    pub fn count_entry_tokens(&self, content: &str) -> usize {
        self.count_tokens(content) + ENTRY_OVERHEAD
    }
}
