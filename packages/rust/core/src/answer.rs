//! Grounded answer service.
//!
//! [`AnswerService::answer`] never fails: an empty knowledge base yields
//! [`KNOWLEDGE_NOT_READY`] without touching the model, and every other
//! failure is logged and replaced by [`ANSWER_FAILED`].

use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use kbchat_gemini::{
    GeminiClient, GeminiOptions, GenerateRequest, GenerativeModel, SamplingParams,
    UnconfiguredModel,
};
use kbchat_shared::{AppConfig, Result, resolve_api_key};
use kbchat_storage::Storage;

use crate::context::build_context;
use crate::prompt::{ANSWER_FAILED, KNOWLEDGE_NOT_READY, system_instruction, user_contents};

/// Model and persona settings for the answer service.
#[derive(Debug, Clone)]
pub struct AnswerSettings {
    /// Model identifier sent with every request.
    pub model_id: String,
    /// Persona name used in the system instruction.
    pub persona: String,
    pub sampling: SamplingParams,
}

impl From<&AppConfig> for AnswerSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            model_id: config.gemini.model.clone(),
            persona: config.assistant.name.clone(),
            sampling: SamplingParams::from(&config.gemini),
        }
    }
}

/// What happened while answering, before it is flattened into reply text.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Outcome {
    NoKnowledge,
    Answered(String),
}

/// Answers questions from the knowledge store through a generative model.
pub struct AnswerService {
    storage: Arc<Storage>,
    model: Arc<dyn GenerativeModel>,
    settings: AnswerSettings,
}

impl AnswerService {
    pub fn new(
        storage: Arc<Storage>,
        model: Arc<dyn GenerativeModel>,
        settings: AnswerSettings,
    ) -> Self {
        Self {
            storage,
            model,
            settings,
        }
    }

    /// Build a service backed by [`GeminiClient`].
    ///
    /// A missing API key is not an error here: the service is still built
    /// and every model call fails, so answers fall back to the fixed replies.
    pub fn from_config(config: &AppConfig, storage: Arc<Storage>) -> Result<Self> {
        let model: Arc<dyn GenerativeModel> = match resolve_api_key(config) {
            Ok(api_key) => Arc::new(GeminiClient::new(GeminiOptions::from_config(
                &config.gemini,
                api_key,
            ))?),
            Err(e) => {
                warn!(env = %config.gemini.api_key_env, "Gemini API key missing, answers will fail");
                Arc::new(UnconfiguredModel::new(e.to_string()))
            }
        };
        Ok(Self::new(storage, model, AnswerSettings::from(config)))
    }

    /// Name of the backing model implementation.
    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Answer `question` from the knowledge base. Always returns reply text.
    #[instrument(skip_all, fields(question_len = question.len()))]
    pub async fn answer(&self, question: &str) -> String {
        match self.try_answer(question).await {
            Ok(Outcome::NoKnowledge) => {
                info!("knowledge base is empty, skipping model call");
                KNOWLEDGE_NOT_READY.to_string()
            }
            Ok(Outcome::Answered(text)) => text,
            Err(e) => {
                error!(error = %e, model = %self.settings.model_id, "failed to generate answer");
                ANSWER_FAILED.to_string()
            }
        }
    }

    async fn try_answer(&self, question: &str) -> Result<Outcome> {
        let Some(knowledge) = build_context(&self.storage).await? else {
            return Ok(Outcome::NoKnowledge);
        };

        let request = GenerateRequest {
            model: self.settings.model_id.clone(),
            system_instruction: system_instruction(&self.settings.persona),
            contents: user_contents(&knowledge, question),
            sampling: self.settings.sampling,
        };

        let text = self.model.generate(&request).await?;
        Ok(Outcome::Answered(text))
    }
}
