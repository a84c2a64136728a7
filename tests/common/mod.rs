#![allow(dead_code)]

use async_trait::async_trait;
use learning_assistant::agent::{ AIAgent, AgentDeps };
use learning_assistant::catalog::{ CatalogPaths, CatalogStore, JsonCatalogSource };
use learning_assistant::config::prompt::{ PromptStore, PromptTemplate };
use learning_assistant::history::FileHistoryStore;
use learning_assistant::llm::chat::{ ChatClient, CompletionResponse };
use learning_assistant::llm::gateway::{ LlmGateway, RetryPolicy };
use learning_assistant::llm::LlmError;
use learning_assistant::progress::{ CourseProgress, ProgressError, ProgressSource, UserProgress };
use std::collections::{ HashMap, VecDeque };
use std::path::Path;
use std::sync::{ Arc, Mutex };
use tempfile::TempDir;

/// Replies from a queue; records the prompts it saw.
pub struct QueueClient {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    pub prompts: Mutex<Vec<String>>,
}

impl QueueClient {
    pub fn new(replies: Vec<Result<String, LlmError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompt(&self, index: usize) -> String {
        self.prompts.lock().unwrap()[index].clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatClient for QueueClient {
    async fn complete(
        &self,
        prompt: &str,
        _system_instruction: Option<&str>
    ) -> Result<CompletionResponse, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let reply = self.replies.lock().unwrap().pop_front().expect("no reply queued");
        reply.map(|response| CompletionResponse { response })
    }

    fn get_model(&self) -> String {
        "queue".to_string()
    }

    fn get_base_url(&self) -> Option<String> {
        None
    }
}

/// In-memory progress keyed by user id.
pub struct MapProgress(pub HashMap<String, UserProgress>);

#[async_trait]
impl ProgressSource for MapProgress {
    async fn fetch(&self, user_id: &str) -> Result<UserProgress, ProgressError> {
        self.0.get(user_id).cloned().ok_or_else(|| ProgressError::NotFound(user_id.to_string()))
    }
}

pub fn learner(name: &str, progress: &[(&str, u8, Option<&str>)]) -> UserProgress {
    UserProgress {
        name: name.to_string(),
        learning_path: Some("Android Developer".to_string()),
        courses: progress
            .iter()
            .enumerate()
            .map(|(i, (course, pct, deadline))| CourseProgress {
                id: Some(i as i64 + 1),
                name: course.to_string(),
                progress: *pct,
                deadline: deadline.map(str::to_string),
            })
            .collect(),
    }
}

fn write_catalog(dir: &Path) -> CatalogPaths {
    let paths = CatalogPaths {
        courses: dir.join("courses.json"),
        learning_paths: dir.join("learning_paths.json"),
        course_levels: dir.join("course_levels.json"),
    };
    std::fs::write(
        &paths.courses,
        r#"[
            {"course_id": 10, "course_name": "Android Expert", "learning_path_id": 1, "course_level_str": 3},
            {"course_id": 11, "course_name": "Kotlin Basics", "learning_path_id": 1, "course_level_str": 1},
            {"course_id": 12, "course_name": "Web Basics", "learning_path_id": 2, "course_level_str": 1}
        ]"#
    ).unwrap();
    std::fs::write(
        &paths.learning_paths,
        r#"[
            {"learning_path_id": 1, "learning_path_name": "Android Developer"},
            {"learning_path_id": 2, "learning_path_name": "Web Developer"}
        ]"#
    ).unwrap();
    std::fs::write(
        &paths.course_levels,
        r#"[
            {"id": 1, "course_level": "Beginner"},
            {"id": 3, "course_level": "Expert"}
        ]"#
    ).unwrap();
    paths
}

pub struct World {
    pub agent: AIAgent,
    pub client: Arc<QueueClient>,
    pub dir: TempDir,
}

/// Agent wired from files on disk: prompts, JSON catalog and a file history store.
pub fn world(replies: Vec<Result<String, LlmError>>, users: Vec<(&str, UserProgress)>) -> World {
    let dir = tempfile::tempdir().unwrap();
    let prompts_dir = dir.path().join("prompts");
    std::fs::create_dir_all(&prompts_dir).unwrap();
    for template in PromptTemplate::ALL {
        std::fs::write(prompts_dir.join(format!("{}.txt", template.name())), "Be helpful.").unwrap();
    }

    let client = Arc::new(QueueClient::new(replies));
    let progress: Arc<dyn ProgressSource> = Arc::new(
        MapProgress(
            users
                .into_iter()
                .map(|(id, p)| (id.to_string(), p))
                .collect()
        )
    );
    let policy = RetryPolicy {
        backoff_unit: std::time::Duration::from_millis(1),
        ..RetryPolicy::default()
    };

    let agent = AIAgent::with_deps(AgentDeps {
        gateway: Arc::new(LlmGateway::new(client.clone(), policy)),
        prompts: Arc::new(PromptStore::new(&prompts_dir)),
        history: Arc::new(FileHistoryStore::new(dir.path().join("history")).unwrap()),
        catalog: Arc::new(CatalogStore::new(Box::new(JsonCatalogSource::new(write_catalog(dir.path()))))),
        progress: Some(progress),
        default_user_id: None,
    });

    World { agent, client, dir }
}
