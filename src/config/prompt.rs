use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::path::{ Path, PathBuf };
use std::str::FromStr;
use std::sync::RwLock;
use log::info;

use crate::models::chat::Category;

#[derive(Debug)]
pub enum PromptError {
    TemplateNotFound(String),
    UnknownTemplate(String),
    IoError(std::io::Error),
}

impl fmt::Display for PromptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptError::TemplateNotFound(path) => write!(f, "Prompt template '{}' not found", path),
            PromptError::UnknownTemplate(name) => write!(f, "Unknown prompt template '{}'", name),
            PromptError::IoError(e) => write!(f, "Prompt file IO error: {}", e),
        }
    }
}

impl Error for PromptError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PromptError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PromptError {
    fn from(err: std::io::Error) -> Self {
        PromptError::IoError(err)
    }
}

/// The instruction templates the assistant knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptTemplate {
    Classifier,
    Learning,
    Tracking,
    Recommendation,
}

impl PromptTemplate {
    pub const ALL: [PromptTemplate; 4] = [
        PromptTemplate::Classifier,
        PromptTemplate::Learning,
        PromptTemplate::Tracking,
        PromptTemplate::Recommendation,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PromptTemplate::Classifier => "classifier",
            PromptTemplate::Learning => "learning",
            PromptTemplate::Tracking => "tracking",
            PromptTemplate::Recommendation => "recommendation",
        }
    }
}

impl From<Category> for PromptTemplate {
    fn from(category: Category) -> Self {
        match category {
            Category::Tracking => PromptTemplate::Tracking,
            Category::Recommendation => PromptTemplate::Recommendation,
            Category::Learning => PromptTemplate::Learning,
        }
    }
}

impl FromStr for PromptTemplate {
    type Err = PromptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PromptTemplate::ALL.iter()
            .copied()
            .find(|t| t.name() == s.trim().to_lowercase())
            .ok_or_else(|| PromptError::UnknownTemplate(s.to_string()))
    }
}

/// Loads `<dir>/<name>.txt` templates and keeps them for the process lifetime.
pub struct PromptStore {
    dir: PathBuf,
    cache: RwLock<HashMap<PromptTemplate, String>>,
}

impl PromptStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, template: PromptTemplate) -> PathBuf {
        self.dir.join(format!("{}.txt", template.name()))
    }

    fn read_from_disk(&self, template: PromptTemplate) -> Result<String, PromptError> {
        let path = self.path_for(template);
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(content.trim().to_string()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(PromptError::TemplateNotFound(path.display().to_string()))
            }
            Err(e) => Err(PromptError::IoError(e)),
        }
    }

    /// Cached read; the file is only touched on the first request.
    pub fn load(&self, template: PromptTemplate) -> Result<String, PromptError> {
        if let Some(content) = self.cache.read().unwrap_or_else(|e| e.into_inner()).get(&template) {
            return Ok(content.clone());
        }

        let content = self.read_from_disk(template)?;
        self.cache
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(template, content.clone());
        Ok(content)
    }

    /// Bypasses the cache and re-reads the template from disk.
    pub fn reload(&self, template: PromptTemplate) -> Result<String, PromptError> {
        self.cache.write().unwrap_or_else(|e| e.into_inner()).remove(&template);
        let content = self.load(template)?;
        info!("Prompt template '{}' reloaded", template.name());
        Ok(content)
    }

    pub fn clear_cache(&self) {
        self.cache.write().unwrap_or_else(|e| e.into_inner()).clear();
        info!("Prompt cache cleared");
    }
}
