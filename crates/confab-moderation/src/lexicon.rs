//! Offline word-list classifier.
//!
//! Fallback for deployments without a hosted classifier, and the moderator
//! used throughout the test suite.  Produces the same label vocabulary as
//! the remote model so the gate logic is identical either way.

use async_trait::async_trait;

use crate::error::ModerationError;
use crate::{Moderator, Verdict};

pub const HATEFUL_LABEL: &str = "Hateful Content Detected";
pub const OFFENSIVE_LABEL: &str = "Offensive Content Detected";
pub const NORMAL_LABEL: &str = "Normal";

/// Word-list classifier.  Matching is per lowercased token, punctuation
/// stripped, so "I hate you, go away" still matches "hate".
#[derive(Debug, Clone)]
pub struct LexiconModerator {
    hateful: Vec<String>,
    offensive: Vec<String>,
}

impl LexiconModerator {
    pub fn new<I, J>(hateful: I, offensive: J) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
        J: IntoIterator,
        J::Item: Into<String>,
    {
        Self {
            hateful: hateful.into_iter().map(|w| w.into().to_lowercase()).collect(),
            offensive: offensive
                .into_iter()
                .map(|w| w.into().to_lowercase())
                .collect(),
        }
    }

    fn label_for(&self, text: &str) -> &'static str {
        let lowered = text.to_lowercase();
        let tokens: Vec<&str> = lowered
            .split_whitespace()
            .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()))
            .collect();

        if self.hateful.iter().any(|w| tokens.contains(&w.as_str())) {
            HATEFUL_LABEL
        } else if self.offensive.iter().any(|w| tokens.contains(&w.as_str())) {
            OFFENSIVE_LABEL
        } else {
            NORMAL_LABEL
        }
    }
}

impl Default for LexiconModerator {
    fn default() -> Self {
        Self::new(
            ["hate", "despise", "vermin"],
            ["stupid", "idiot", "loser", "trash"],
        )
    }
}

#[async_trait]
impl Moderator for LexiconModerator {
    async fn classify(&self, text: &str) -> Result<Verdict, ModerationError> {
        Ok(Verdict::new(self.label_for(text)))
    }
}
