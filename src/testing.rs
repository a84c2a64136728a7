//! Scripted collaborators shared by unit tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{ Arc, Mutex };

use crate::agent::{ AIAgent, AgentDeps };
use crate::catalog::fixtures::sample_catalog;
use crate::catalog::CatalogStore;
use crate::config::prompt::{ PromptStore, PromptTemplate };
use crate::history::FileHistoryStore;
use crate::llm::chat::{ ChatClient, CompletionResponse };
use crate::llm::gateway::{ LlmGateway, RetryPolicy };
use crate::llm::LlmError;
use crate::progress::{ CourseProgress, ProgressError, ProgressSource, UserProgress };

#[derive(Clone, Debug)]
pub struct RecordedCall {
    pub prompt: String,
    pub system: Option<String>,
}

/// Returns queued responses in order and records every prompt it was given.
pub struct ScriptedChatClient {
    responses: Mutex<VecDeque<Result<String, LlmError>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedChatClient {
    pub fn new(responses: Vec<Result<String, LlmError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatClient for ScriptedChatClient {
    async fn complete(
        &self,
        prompt: &str,
        system_instruction: Option<&str>
    ) -> Result<CompletionResponse, LlmError> {
        self.calls.lock().unwrap().push(RecordedCall {
            prompt: prompt.to_string(),
            system: system_instruction.map(str::to_string),
        });
        let next = self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("ScriptedChatClient: no response left for call"));
        next.map(|response| CompletionResponse { response })
    }

    fn get_model(&self) -> String {
        "scripted".to_string()
    }

    fn get_base_url(&self) -> Option<String> {
        None
    }
}

/// Progress source that returns the same snapshot for every user.
pub struct FixedProgress(pub Option<UserProgress>);

#[async_trait]
impl ProgressSource for FixedProgress {
    async fn fetch(&self, user_id: &str) -> Result<UserProgress, ProgressError> {
        self.0.clone().ok_or_else(|| ProgressError::NotFound(user_id.to_string()))
    }
}

pub fn sample_progress() -> UserProgress {
    UserProgress {
        name: "Dina".into(),
        learning_path: Some("Android Developer".into()),
        courses: vec![
            CourseProgress {
                id: Some(1),
                name: "Kotlin Basics".into(),
                progress: 100,
                deadline: None,
            },
            CourseProgress {
                id: Some(2),
                name: "Android Fundamentals".into(),
                progress: 40,
                deadline: Some("2099-01-01".into()),
            },
            CourseProgress {
                id: Some(3),
                name: "Android Intermediate".into(),
                progress: 0,
                deadline: None,
            }
        ],
    }
}

/// An agent over scripted LLM replies, the sample catalog and a temp-dir history.
pub struct AgentHarness {
    pub agent: AIAgent,
    pub client: Arc<ScriptedChatClient>,
    pub history: Arc<FileHistoryStore>,
    _dir: tempfile::TempDir,
}

pub fn agent_harness(
    responses: Vec<Result<String, LlmError>>,
    progress: Option<FixedProgress>
) -> AgentHarness {
    let dir = tempfile::tempdir().unwrap();
    let prompts_dir = dir.path().join("prompts");
    std::fs::create_dir_all(&prompts_dir).unwrap();
    for template in PromptTemplate::ALL {
        std::fs::write(
            prompts_dir.join(format!("{}.txt", template.name())),
            format!("{} instructions", template.name())
        ).unwrap();
    }

    let client = Arc::new(ScriptedChatClient::new(responses));
    let history = Arc::new(FileHistoryStore::new(dir.path().join("history")).unwrap());
    let agent = AIAgent::with_deps(AgentDeps {
        gateway: Arc::new(LlmGateway::new(client.clone(), RetryPolicy::default())),
        prompts: Arc::new(PromptStore::new(&prompts_dir)),
        history: history.clone(),
        catalog: Arc::new(CatalogStore::from_catalog(sample_catalog())),
        progress: progress.map(|p| Arc::new(p) as Arc<dyn ProgressSource>),
        default_user_id: Some("u-default".into()),
    });
    AgentHarness { agent, client, history, _dir: dir }
}
