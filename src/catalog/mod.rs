//! Read-only course catalog: courses, learning paths and course levels.

pub mod recommend;

use log::{ info, warn };
use serde::de::DeserializeOwned;
use serde::{ Deserialize, Serialize };
use std::collections::HashMap;
use std::path::{ Path, PathBuf };
use std::sync::{ Arc, RwLock };

pub const UNKNOWN: &str = "Unknown";

fn default_level() -> i64 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub course_id: i64,
    pub course_name: String,
    #[serde(default)]
    pub learning_path_id: Option<i64>,
    #[serde(rename = "course_level_str", alias = "course_level_id", default = "default_level")]
    pub level_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningPath {
    pub learning_path_id: i64,
    pub learning_path_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseLevel {
    pub id: i64,
    pub course_level: String,
}

/// Immutable snapshot of the catalog with id lookups.
#[derive(Debug, Default, Clone)]
pub struct Catalog {
    courses: Vec<Course>,
    learning_paths: Vec<LearningPath>,
    course_levels: Vec<CourseLevel>,
    path_names: HashMap<i64, String>,
    level_names: HashMap<i64, String>,
}

impl Catalog {
    pub fn new(
        courses: Vec<Course>,
        learning_paths: Vec<LearningPath>,
        course_levels: Vec<CourseLevel>
    ) -> Self {
        let path_names = learning_paths
            .iter()
            .map(|p| (p.learning_path_id, p.learning_path_name.clone()))
            .collect();
        let level_names = course_levels
            .iter()
            .map(|l| (l.id, l.course_level.clone()))
            .collect();
        Self {
            courses,
            learning_paths,
            course_levels,
            path_names,
            level_names,
        }
    }

    pub fn courses(&self) -> &[Course] {
        &self.courses
    }

    pub fn learning_paths(&self) -> &[LearningPath] {
        &self.learning_paths
    }

    pub fn course_levels(&self) -> &[CourseLevel] {
        &self.course_levels
    }

    pub fn level_name(&self, level_id: i64) -> &str {
        self.level_names.get(&level_id).map(String::as_str).unwrap_or(UNKNOWN)
    }

    pub fn learning_path_name(&self, path_id: Option<i64>) -> &str {
        path_id
            .and_then(|id| self.path_names.get(&id))
            .map(String::as_str)
            .unwrap_or(UNKNOWN)
    }

    /// Case-insensitive exact match on the path name.
    pub fn find_learning_path(&self, name: &str) -> Option<&LearningPath> {
        let wanted = name.trim().to_lowercase();
        self.learning_paths.iter().find(|p| p.learning_path_name.to_lowercase() == wanted)
    }

    pub fn courses_in_path(&self, path_id: i64) -> Vec<&Course> {
        self.courses
            .iter()
            .filter(|c| c.learning_path_id == Some(path_id))
            .collect()
    }
}

/// Where catalog data comes from. Loading never fails; bad sources yield empty collections.
pub trait CatalogSource: Send + Sync {
    fn load(&self) -> Catalog;
}

#[derive(Debug, Clone)]
pub struct CatalogPaths {
    pub courses: PathBuf,
    pub learning_paths: PathBuf,
    pub course_levels: PathBuf,
}

pub struct JsonCatalogSource {
    paths: CatalogPaths,
}

impl JsonCatalogSource {
    pub fn new(paths: CatalogPaths) -> Self {
        Self { paths }
    }
}

fn load_json_list<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Catalog file {} unavailable ({}), using empty list", path.display(), e);
            return Vec::new();
        }
    };
    match serde_json::from_str::<Vec<T>>(&content) {
        Ok(items) => items,
        Err(e) => {
            warn!("Invalid JSON in {}: {}, using empty list", path.display(), e);
            Vec::new()
        }
    }
}

impl CatalogSource for JsonCatalogSource {
    fn load(&self) -> Catalog {
        let catalog = Catalog::new(
            load_json_list(&self.paths.courses),
            load_json_list(&self.paths.learning_paths),
            load_json_list(&self.paths.course_levels)
        );
        info!(
            "Catalog loaded: {} courses, {} learning paths, {} levels",
            catalog.courses().len(),
            catalog.learning_paths().len(),
            catalog.course_levels().len()
        );
        catalog
    }
}

/// Holds the current catalog snapshot; replaced only by an explicit reload.
pub struct CatalogStore {
    source: Box<dyn CatalogSource>,
    current: RwLock<Arc<Catalog>>,
}

impl CatalogStore {
    pub fn new(source: Box<dyn CatalogSource>) -> Self {
        let initial = Arc::new(source.load());
        Self {
            source,
            current: RwLock::new(initial),
        }
    }

    /// A store over an in-memory catalog; reloading yields the same data.
    pub fn from_catalog(catalog: Catalog) -> Self {
        struct Fixed(Catalog);
        impl CatalogSource for Fixed {
            fn load(&self) -> Catalog {
                self.0.clone()
            }
        }
        Self::new(Box::new(Fixed(catalog)))
    }

    pub fn snapshot(&self) -> Arc<Catalog> {
        Arc::clone(&self.current.read().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn reload(&self) -> Arc<Catalog> {
        let fresh = Arc::new(self.source.load());
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = Arc::clone(&fresh);
        fresh
    }
}
