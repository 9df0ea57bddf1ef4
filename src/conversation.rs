//! Analysis and follow-up history for one interactive session.
//!
//! The QA log is always scoped to the analysis it was asked against:
//! storing a new analysis drops the old log in the same assignment, so no
//! stale answers can survive a regeneration.
use crate::error::{ForecastError, Result};
use crate::prompt::{build_followup_prompt, PromptLanguage};
use serde::Serialize;

/// One question asked against the current analysis and its answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QaEntry {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConversationState {
    #[default]
    Empty,
    HasAnalysis {
        analysis: String,
        log: Vec<QaEntry>,
    },
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a freshly generated analysis, replacing any previous one and
    /// its QA log.
    pub fn generate(&mut self, analysis: String) {
        *self = Self::HasAnalysis {
            analysis,
            log: Vec::new(),
        };
    }

    /// Append a question/answer pair. Fails without touching state when no
    /// analysis exists yet.
    pub fn ask(&mut self, question: String, answer: String) -> Result<&QaEntry> {
        match self {
            Self::Empty => Err(no_analysis()),
            Self::HasAnalysis { log, .. } => {
                log.push(QaEntry { question, answer });
                Ok(&log[log.len() - 1])
            }
        }
    }

    /// Follow-up prompt for `question` against the stored analysis.
    pub fn followup_prompt(&self, language: PromptLanguage, question: &str) -> Result<String> {
        let analysis = self.analysis().ok_or_else(no_analysis)?;
        Ok(build_followup_prompt(language, analysis, question))
    }

    pub fn analysis(&self) -> Option<&str> {
        match self {
            Self::Empty => None,
            Self::HasAnalysis { analysis, .. } => Some(analysis),
        }
    }

    pub fn history(&self) -> &[QaEntry] {
        match self {
            Self::Empty => &[],
            Self::HasAnalysis { log, .. } => log,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Drop the analysis and its log, e.g. after a new dataset is loaded.
    pub fn reset(&mut self) {
        *self = Self::Empty;
    }
}

fn no_analysis() -> ForecastError {
    ForecastError::PreconditionFailed("no analysis to question".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ask_before_generate_fails_without_mutation() {
        let mut state = ConversationState::new();
        let err = state
            .ask("why?".to_string(), "because".to_string())
            .unwrap_err();
        assert!(
            matches!(err, ForecastError::PreconditionFailed(ref msg) if msg == "no analysis to question")
        );
        assert_eq!(state, ConversationState::Empty);
        assert!(state.history().is_empty());
    }

    #[test]
    fn ask_appends_in_order() {
        let mut state = ConversationState::new();
        state.generate("R1".to_string());
        state.ask("Q1".to_string(), "A1".to_string()).expect("ask");
        let entry = state.ask("Q2".to_string(), "A2".to_string()).expect("ask");
        assert_eq!(entry.question, "Q2");
        let questions = state
            .history()
            .iter()
            .map(|entry| entry.question.as_str())
            .collect::<Vec<_>>();
        assert_eq!(questions, vec!["Q1", "Q2"]);
        assert_eq!(state.analysis(), Some("R1"));
    }

    #[test]
    fn regenerate_clears_log() {
        let mut state = ConversationState::new();
        state.generate("R1".to_string());
        state.ask("Q".to_string(), "A".to_string()).expect("ask");
        state.generate("R2".to_string());
        assert_eq!(state.analysis(), Some("R2"));
        assert!(state.history().is_empty());
    }

    #[test]
    fn followup_prompt_requires_analysis() {
        let mut state = ConversationState::new();
        assert!(matches!(
            state.followup_prompt(PromptLanguage::En, "Q"),
            Err(ForecastError::PreconditionFailed(_))
        ));
        state.generate("Stored analysis text".to_string());
        let prompt = state.followup_prompt(PromptLanguage::En, "Q").expect("prompt");
        assert!(prompt.contains("Stored analysis text"));
    }

    #[test]
    fn reset_returns_to_empty() {
        let mut state = ConversationState::new();
        state.generate("R1".to_string());
        state.reset();
        assert!(state.is_empty());
        assert_eq!(state.analysis(), None);
    }
}
