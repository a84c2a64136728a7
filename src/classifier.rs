use log::debug;
use std::sync::Arc;

use crate::config::prompt::{ PromptStore, PromptTemplate };
use crate::error::AssistantError;
use crate::llm::gateway::LlmGateway;
use crate::models::chat::Category;

/// Routes a free-text query to one of the three categories with a single LLM call.
pub struct Classifier {
    gateway: Arc<LlmGateway>,
    prompts: Arc<PromptStore>,
}

fn classification_prompt(query: &str) -> String {
    format!(
        "Classify the following question:\n\n\"{}\"\n\nAnswer with exactly one word: tracking, recommendation, or learning",
        query
    )
}

/// Reads a category out of the model's raw reply. Never fails: unclear replies are `Learning`.
pub fn parse_category(raw: &str) -> Category {
    let reply = raw.trim().to_lowercase();
    let token = reply.trim_matches(|c: char| !c.is_alphanumeric());
    if let Ok(category) = token.parse::<Category>() {
        return category;
    }

    if reply.contains("tracking") {
        Category::Tracking
    } else if reply.contains("recommendation") {
        Category::Recommendation
    } else {
        Category::Learning
    }
}

impl Classifier {
    pub fn new(gateway: Arc<LlmGateway>, prompts: Arc<PromptStore>) -> Self {
        Self { gateway, prompts }
    }

    pub async fn classify(&self, query: &str) -> Result<Category, AssistantError> {
        let system_prompt = self.prompts.load(PromptTemplate::Classifier)?;
        let raw = self.gateway
            .generate(&classification_prompt(query), Some(&system_prompt)).await
            .map_err(AssistantError::from_classification)?;

        let category = parse_category(&raw);
        debug!("Classifier reply {:?} -> {}", raw.trim(), category);
        Ok(category)
    }
}
