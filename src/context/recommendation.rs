use std::fmt::Write;

use crate::catalog::Catalog;

pub const DEFAULT_CONTEXT_COURSE_LIMIT: usize = 20;

/// Lists every path and level, then the first `limit` courses in catalog order.
pub fn build_recommendation_context(catalog: &Catalog, limit: usize) -> String {
    let mut out = String::from("AVAILABLE LEARNING PATHS:\n");
    for path in catalog.learning_paths() {
        let _ = writeln!(out, "- {}", path.learning_path_name);
    }

    out.push_str("\nCOURSE LEVELS:\n");
    for level in catalog.course_levels() {
        let _ = writeln!(out, "- {} (Level {})", level.course_level, level.id);
    }

    let _ = writeln!(out, "\nSAMPLE COURSES (of {} total):", catalog.courses().len());
    for (i, course) in catalog.courses().iter().take(limit).enumerate() {
        let _ = writeln!(
            out,
            "{}. {}\n   Path: {} | Level: {}",
            i + 1,
            course.course_name,
            catalog.learning_path_name(course.learning_path_id),
            catalog.level_name(course.level_id)
        );
    }
    out
}
