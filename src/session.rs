//! Interactive session state.
//!
//! A `Session` is the explicit state object handed to every user action.
//! Each action performs at most one blocking generation call and only then
//! updates state, so a failed call leaves everything as it was.
use crate::conversation::{ConversationState, QaEntry};
use crate::dataset::{self, Dataset, ROW_LIMIT};
use crate::error::{ForecastError, Result};
use crate::lm_client::TextGenerator;
use crate::lm_log::{LmInvocationKind, LmLog, LmLogBuilder};
use crate::prompt::{build_analysis_prompt, Horizon, PromptOptions};

/// Parameters for one "generate analysis" action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionRequest {
    pub program: String,
    pub horizon: Horizon,
    pub trends: String,
}

impl ProjectionRequest {
    pub fn new(program: impl Into<String>, horizon: Horizon, trends: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            horizon,
            trends: trends.into(),
        }
    }
}

pub struct Session {
    dataset: Option<Dataset>,
    programs: Vec<String>,
    conversation: ConversationState,
    options: PromptOptions,
    qa_enabled: bool,
    generator: Option<Box<dyn TextGenerator>>,
    missing_generator: String,
    lm_log: Option<LmLog>,
}

impl Session {
    pub fn new(options: PromptOptions, qa_enabled: bool) -> Self {
        Self {
            dataset: None,
            programs: Vec::new(),
            conversation: ConversationState::new(),
            options,
            qa_enabled,
            generator: None,
            missing_generator: "no LM backend configured".to_string(),
            lm_log: None,
        }
    }

    pub fn with_generator(mut self, generator: Box<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Record why generation is unavailable; reported on every attempt.
    pub fn without_generator(mut self, reason: impl Into<String>) -> Self {
        self.generator = None;
        self.missing_generator = reason.into();
        self
    }

    pub fn with_lm_log(mut self, lm_log: LmLog) -> Self {
        self.lm_log = Some(lm_log);
        self
    }

    /// Replace the dataset wholesale. The previous analysis belonged to the
    /// old data, so the conversation is reset too. On validation failure the
    /// current dataset is kept.
    pub fn load_dataset(&mut self, dataset: Dataset) -> Result<&[String]> {
        let programs = dataset::validate(&dataset)?;
        self.dataset = Some(dataset);
        self.programs = programs;
        self.conversation.reset();
        Ok(&self.programs)
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    pub fn programs(&self) -> &[String] {
        &self.programs
    }

    pub fn conversation(&self) -> &ConversationState {
        &self.conversation
    }

    pub fn qa_enabled(&self) -> bool {
        self.qa_enabled
    }

    pub fn can_generate(&self) -> bool {
        self.generator.is_some()
    }

    /// Render the analysis prompt for `request` without calling the LM.
    pub fn analysis_prompt(&self, request: &ProjectionRequest) -> Result<String> {
        let dataset = self.dataset.as_ref().ok_or_else(|| {
            ForecastError::PreconditionFailed("no dataset loaded".to_string())
        })?;
        if !self.programs.iter().any(|program| program == &request.program) {
            return Err(ForecastError::InvalidArgument(format!(
                "unknown program {:?}",
                request.program
            )));
        }
        let rows = dataset::filter(dataset, &request.program, ROW_LIMIT)?;
        let table = dataset::render_table(dataset.headers(), &rows);
        Ok(build_analysis_prompt(
            &self.options,
            &request.program,
            request.horizon,
            &request.trends,
            &table,
        ))
    }

    /// Generate a new analysis, replacing the previous one and its QA log.
    pub fn generate_analysis(&mut self, request: &ProjectionRequest) -> Result<&str> {
        let prompt = self.analysis_prompt(request)?;
        let analysis = self.invoke(LmInvocationKind::Analysis, &prompt, Some(request))?;
        self.conversation.generate(analysis);
        Ok(self.conversation.analysis().unwrap_or_default())
    }

    /// Ask a follow-up question against the current analysis.
    pub fn ask(&mut self, question: &str) -> Result<&QaEntry> {
        if !self.qa_enabled {
            return Err(ForecastError::FeatureDisabled(
                "follow-up questions are disabled".to_string(),
            ));
        }
        let question = question.trim();
        if question.is_empty() {
            return Err(ForecastError::InvalidArgument(
                "question must not be empty".to_string(),
            ));
        }
        let prompt = self.conversation
            .followup_prompt(self.options.language, question)?;
        let answer = self.invoke(LmInvocationKind::Followup, &prompt, None)?;
        self.conversation.ask(question.to_string(), answer)
    }

    fn invoke(
        &mut self,
        kind: LmInvocationKind,
        prompt: &str,
        request: Option<&ProjectionRequest>,
    ) -> Result<String> {
        let generator = self
            .generator
            .as_ref()
            .ok_or_else(|| ForecastError::MissingCredential(self.missing_generator.clone()))?;
        let backend = generator.describe();
        let log_builder = self.lm_log.as_mut().map(|log| {
            let builder = LmLogBuilder::new(log.next_call(), kind, backend.clone())
                .with_prompt_preview(prompt);
            match request {
                Some(request) => builder.with_request(&request.program, request.horizon.years()),
                None => builder,
            }
        });

        tracing::debug!(%kind, backend = %backend, prompt_bytes = prompt.len(), "generation start");
        let result = generator.generate(prompt);

        if let (Some(log), Some(builder)) = (self.lm_log.as_ref(), log_builder) {
            let entry = match &result {
                Ok(text) => builder.success(text),
                Err(err) => builder.failed(err.to_string()),
            };
            let call = entry.call;
            let written = log.append(&entry).and_then(|()| match &result {
                Ok(text) => log.store_content(call, kind, prompt, text),
                Err(_) => Ok(()),
            });
            if let Err(err) = written {
                tracing::warn!(error = %format!("{err:#}"), "failed to write lm_log");
            }
        }

        match result {
            Ok(text) => Ok(text),
            Err(err) => {
                tracing::warn!(%kind, error = %err, "generation failed");
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
