use log::warn;
use serde::Serialize;
use std::collections::BTreeMap;

use super::Catalog;

pub const DEFAULT_RECOMMENDATION_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseRecommendation {
    pub course_id: i64,
    pub course_name: String,
    pub level_id: i64,
    pub level_name: String,
    pub learning_path_id: Option<i64>,
    pub learning_path_name: String,
}

/// Courses filtered by path name and level id, ordered by level (stable) and truncated.
///
/// An empty `path_name` means no filter. A non-empty name that matches no
/// learning path yields nothing rather than falling back to every course.
pub fn recommend(
    catalog: &Catalog,
    path_name: Option<&str>,
    level_id: Option<i64>,
    limit: usize
) -> Vec<CourseRecommendation> {
    let path_filter = match path_name.map(str::trim).filter(|n| !n.is_empty()) {
        None => None,
        Some(name) =>
            match catalog.find_learning_path(name) {
                Some(path) => Some(path.learning_path_id),
                None => {
                    warn!("Learning path not found: {}", name);
                    return Vec::new();
                }
            }
    };

    let mut courses: Vec<_> = catalog
        .courses()
        .iter()
        .filter(|c| path_filter.map_or(true, |id| c.learning_path_id == Some(id)))
        .filter(|c| level_id.map_or(true, |level| c.level_id == level))
        .collect();
    courses.sort_by_key(|c| c.level_id);

    courses
        .into_iter()
        .take(limit)
        .map(|c| CourseRecommendation {
            course_id: c.course_id,
            course_name: c.course_name.clone(),
            level_id: c.level_id,
            level_name: catalog.level_name(c.level_id).to_string(),
            learning_path_id: c.learning_path_id,
            learning_path_name: catalog.learning_path_name(c.learning_path_id).to_string(),
        })
        .collect()
}

/// Text overview of a learning path with its courses grouped under level names.
pub fn learning_path_overview(catalog: &Catalog, name: &str) -> String {
    let Some(path) = catalog.find_learning_path(name) else {
        return format!("Learning path '{}' not found", name);
    };

    let courses = catalog.courses_in_path(path.learning_path_id);
    if courses.is_empty() {
        return format!("No courses available for {}", path.learning_path_name);
    }

    let mut by_level: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for course in &courses {
        by_level
            .entry(catalog.level_name(course.level_id))
            .or_default()
            .push(course.course_name.as_str());
    }

    let mut overview = format!(
        "{}\nTotal courses: {}\n",
        path.learning_path_name,
        courses.len()
    );
    for (level, names) in by_level {
        overview.push_str(&format!("\n{}:\n", level));
        for name in names {
            overview.push_str(&format!("  - {}\n", name));
        }
    }
    overview
}
