use crate::catalog::recommend::{ self, CourseRecommendation };
use crate::catalog::{ Catalog, CatalogPaths, CatalogStore, JsonCatalogSource };
use crate::classifier::Classifier;
use crate::cli::Args;
use crate::config::prompt::{ PromptStore, PromptTemplate };
use crate::context::{ build_recommendation_context, build_tracking_context, DEFAULT_CONTEXT_COURSE_LIMIT };
use crate::error::AssistantError;
use crate::history::{ initialize_history_store, validate_session_id, HistoryStore, HISTORY_WINDOW_TURNS };
use crate::llm::chat::new_client as new_chat_client;
use crate::llm::gateway::{ LlmGateway, RetryPolicy };
use crate::llm::{ parse_llm_type, LlmConfig };
use crate::models::chat::{ Category, ChatMessage, ChatOutcome, SessionSummary };
use crate::progress::{ HttpProgressSource, ProgressSource, UserProgress };

use chrono::{ Local, NaiveDate };
use log::{ debug, info, warn };
use serde_json::{ Map, Value };
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Collaborators the agent routes between.
pub struct AgentDeps {
    pub gateway: Arc<LlmGateway>,
    pub prompts: Arc<PromptStore>,
    pub history: Arc<dyn HistoryStore>,
    pub catalog: Arc<CatalogStore>,
    pub progress: Option<Arc<dyn ProgressSource>>,
    pub default_user_id: Option<String>,
}

#[derive(Clone)]
pub struct AIAgent {
    gateway: Arc<LlmGateway>,
    classifier: Arc<Classifier>,
    prompts: Arc<PromptStore>,
    history_store: Arc<dyn HistoryStore>,
    catalog: Arc<CatalogStore>,
    progress: Option<Arc<dyn ProgressSource>>,
    default_user_id: Option<String>,
}

/// Context block for one request plus the metadata recorded with the turn.
struct ContextSnapshot {
    text: String,
    metadata: Option<Map<String, Value>>,
}

fn compose_prompt(window: &str, context: &str, query: &str) -> String {
    let mut sections = Vec::with_capacity(3);
    if !window.is_empty() {
        sections.push(window.to_string());
    }
    if !context.is_empty() {
        sections.push(context.to_string());
    }
    sections.push(format!("USER QUESTION:\n{}\n\nANSWER:", query));
    sections.join("\n\n")
}

fn non_empty(value: &str) -> Option<String> {
    Some(value.trim().to_string()).filter(|v| !v.is_empty())
}

impl AIAgent {
    fn initialize_llm_gateway(args: &Args) -> Result<Arc<LlmGateway>, Box<dyn Error + Send + Sync>> {
        let chat_config = LlmConfig {
            llm_type: parse_llm_type(&args.chat_llm_type)?,
            base_url: args.chat_base_url.clone(),
            api_key: non_empty(&args.chat_api_key),
            completion_model: args.chat_model.clone(),
            timeout: Duration::from_secs(args.llm_timeout_secs),
        };
        let chat_client = new_chat_client(&chat_config)?;
        info!(
            "Chat client configured: Type={}, Model={}, BaseURL={}",
            args.chat_llm_type,
            chat_client.get_model(),
            chat_client.get_base_url().as_deref().unwrap_or("adapter default")
        );

        let policy = RetryPolicy::default().with_max_attempts(args.llm_max_attempts);
        info!("LLM retry policy: max_attempts={}", policy.max_attempts);
        Ok(Arc::new(LlmGateway::new(chat_client, policy)))
    }

    fn initialize_progress_source(
        args: &Args
    ) -> Result<Option<Arc<dyn ProgressSource>>, Box<dyn Error + Send + Sync>> {
        match args.progress_api_url.as_deref().and_then(non_empty) {
            Some(url) => {
                info!("Progress data will be fetched from {}", url);
                let source = HttpProgressSource::new(
                    url,
                    Duration::from_secs(args.progress_timeout_secs)
                )?;
                Ok(Some(Arc::new(source)))
            }
            None => {
                warn!("USER_API_URL not set; tracking questions will fail");
                Ok(None)
            }
        }
    }

    pub async fn new(args: Args) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let gateway = Self::initialize_llm_gateway(&args)?;
        let history = initialize_history_store(&args)?;

        let prompts = Arc::new(PromptStore::new(&args.prompts_dir));
        info!("Prompt templates will be read from {}", prompts.dir().display());

        let catalog = Arc::new(
            CatalogStore::new(
                Box::new(
                    JsonCatalogSource::new(CatalogPaths {
                        courses: PathBuf::from(&args.courses_path),
                        learning_paths: PathBuf::from(&args.learning_paths_path),
                        course_levels: PathBuf::from(&args.course_levels_path),
                    })
                )
            )
        );

        let progress = Self::initialize_progress_source(&args)?;

        Ok(
            Self::with_deps(AgentDeps {
                gateway,
                prompts,
                history,
                catalog,
                progress,
                default_user_id: args.default_user_id.as_deref().and_then(non_empty),
            })
        )
    }

    pub fn with_deps(deps: AgentDeps) -> Self {
        Self {
            classifier: Arc::new(Classifier::new(Arc::clone(&deps.gateway), Arc::clone(&deps.prompts))),
            gateway: deps.gateway,
            prompts: deps.prompts,
            history_store: deps.history,
            catalog: deps.catalog,
            progress: deps.progress,
            default_user_id: deps.default_user_id,
        }
    }

    /// Classifies, gathers context, asks the LLM and records the turn when a session is given.
    pub async fn process_message(
        &self,
        query: &str,
        session_id: Option<&str>,
        user_id: Option<&str>
    ) -> Result<ChatOutcome, AssistantError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AssistantError::InvalidRequest("query must not be empty".into()));
        }
        if let Some(id) = session_id {
            validate_session_id(id)?;
        }

        let category = self.classifier.classify(query).await?;
        debug!("Query classified as {}", category);

        let snapshot = self.build_context(category, user_id).await?;
        debug!("Context built for {} ({} chars)", category, snapshot.text.len());

        let window = match session_id {
            Some(id) => self.history_store.render_window(id, HISTORY_WINDOW_TURNS).await?,
            None => String::new(),
        };

        let system_prompt = self.prompts.load(PromptTemplate::from(category))?;
        let prompt = compose_prompt(&window, &snapshot.text, query);
        let answer = self.gateway.generate(&prompt, Some(&system_prompt)).await?;
        debug!("Answer received from {} ({} chars)", self.gateway.model(), answer.len());

        if let Some(id) = session_id {
            self.history_store.append(id, query, &answer, category, snapshot.metadata).await?;
            debug!("Turn persisted to session {}", id);
        }

        Ok(ChatOutcome {
            answer,
            category,
            session_id: session_id.map(str::to_string),
        })
    }

    async fn build_context(
        &self,
        category: Category,
        user_id: Option<&str>
    ) -> Result<ContextSnapshot, AssistantError> {
        match category {
            Category::Tracking => {
                let user = self.resolve_user(user_id)?;
                let progress = self.fetch_progress_for(&user).await?;
                let mut metadata = Map::new();
                metadata.insert("user_id".to_string(), Value::String(user));
                Ok(ContextSnapshot {
                    text: build_tracking_context(&progress, Self::today()),
                    metadata: Some(metadata),
                })
            }
            Category::Recommendation => {
                let catalog = self.catalog.snapshot();
                Ok(ContextSnapshot {
                    text: build_recommendation_context(&catalog, DEFAULT_CONTEXT_COURSE_LIMIT),
                    metadata: None,
                })
            }
            Category::Learning => Ok(ContextSnapshot { text: String::new(), metadata: None }),
        }
    }

    pub fn today() -> NaiveDate {
        Local::now().date_naive()
    }

    fn resolve_user(&self, user_id: Option<&str>) -> Result<String, AssistantError> {
        user_id
            .and_then(non_empty)
            .or_else(|| self.default_user_id.clone())
            .ok_or_else(|| {
                AssistantError::DataSourceUnavailable(
                    "no user id supplied and no default user configured".into()
                )
            })
    }

    async fn fetch_progress_for(&self, user_id: &str) -> Result<UserProgress, AssistantError> {
        let source = self.progress
            .as_ref()
            .ok_or_else(|| {
                AssistantError::DataSourceUnavailable("progress API is not configured".into())
            })?;
        match source.fetch(user_id).await {
            Ok(progress) => Ok(progress),
            Err(e) => {
                warn!("Progress fetch for user {} failed: {}", user_id, e);
                Err(e.into())
            }
        }
    }

    /// Progress for the given user, or the configured default user.
    pub async fn fetch_progress(&self, user_id: Option<&str>) -> Result<UserProgress, AssistantError> {
        let user = self.resolve_user(user_id)?;
        self.fetch_progress_for(&user).await
    }

    pub async fn history(
        &self,
        session_id: &str,
        limit: Option<usize>
    ) -> Result<Vec<ChatMessage>, AssistantError> {
        Ok(self.history_store.read(session_id, limit).await?)
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<(), AssistantError> {
        if self.history_store.delete(session_id).await? {
            info!("Session {} deleted", session_id);
            Ok(())
        } else {
            Err(AssistantError::SessionNotFound(session_id.to_string()))
        }
    }

    pub async fn clear_history(&self) -> Result<usize, AssistantError> {
        let deleted = self.history_store.clear_all().await?;
        info!("Cleared {} session(s)", deleted);
        Ok(deleted)
    }

    pub async fn list_sessions(&self) -> Result<Vec<SessionSummary>, AssistantError> {
        Ok(self.history_store.list().await?)
    }

    pub fn catalog(&self) -> Arc<Catalog> {
        self.catalog.snapshot()
    }

    pub fn reload_catalog(&self) -> Arc<Catalog> {
        self.catalog.reload()
    }

    pub fn recommend(
        &self,
        learning_path: Option<&str>,
        level_id: Option<i64>,
        limit: usize
    ) -> Vec<CourseRecommendation> {
        recommend::recommend(&self.catalog.snapshot(), learning_path, level_id, limit)
    }

    pub fn learning_path_overview(&self, name: &str) -> String {
        recommend::learning_path_overview(&self.catalog.snapshot(), name)
    }

    /// Reloads one named template, or drops the whole cache when no name is given.
    pub fn reload_prompts(&self, name: Option<&str>) -> Result<Vec<&'static str>, AssistantError> {
        match name.and_then(non_empty) {
            Some(name) => {
                let template: PromptTemplate = name.parse()?;
                self.prompts.reload(template)?;
                Ok(vec![template.name()])
            }
            None => {
                self.prompts.clear_cache();
                Ok(
                    PromptTemplate::ALL.iter()
                        .map(|t| t.name())
                        .collect()
                )
            }
        }
    }
}
