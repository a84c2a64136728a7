use chrono::NaiveDate;
use serde::Serialize;
use std::fmt::Write;

use crate::progress::{ CourseProgress, UserProgress };

const DEADLINE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeadlineInfo {
    pub course_name: String,
    pub deadline: NaiveDate,
    pub days_left: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverdueCourse {
    pub course_name: String,
    pub days_overdue: i64,
}

/// Aggregate figures over one user's courses, relative to `today`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSummary {
    pub total: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub not_started: usize,
    pub completion_rate: f64,
    pub average_progress: f64,
    pub remaining_percent: f64,
    pub nearest_deadline: Option<DeadlineInfo>,
    pub overdue: Vec<OverdueCourse>,
}

fn parse_deadline(course: &CourseProgress) -> Option<NaiveDate> {
    course.deadline
        .as_deref()
        .and_then(|d| NaiveDate::parse_from_str(d.trim(), DEADLINE_FORMAT).ok())
}

fn percent(part: f64, whole: f64) -> f64 {
    if whole > 0.0 { (part / whole) * 100.0 } else { 0.0 }
}

impl ProgressSummary {
    pub fn compute(progress: &UserProgress, today: NaiveDate) -> Self {
        let courses = &progress.courses;
        let total = courses.len();
        let completed = courses
            .iter()
            .filter(|c| c.progress >= 100)
            .count();
        let in_progress = courses
            .iter()
            .filter(|c| c.progress > 0 && c.progress < 100)
            .count();

        let progress_sum: u64 = courses
            .iter()
            .map(|c| u64::from(c.progress))
            .sum();
        let remaining_sum: u64 = courses
            .iter()
            .map(|c| 100 - u64::from(c.progress.min(100)))
            .sum();

        let mut nearest_deadline: Option<DeadlineInfo> = None;
        let mut overdue = Vec::new();
        for course in courses {
            let Some(deadline) = parse_deadline(course) else {
                continue;
            };
            let days_left = (deadline - today).num_days();
            if days_left < 0 && course.progress < 100 {
                overdue.push(OverdueCourse {
                    course_name: course.name.clone(),
                    days_overdue: -days_left,
                });
            }
            if nearest_deadline.as_ref().map_or(true, |n| days_left < n.days_left) {
                nearest_deadline = Some(DeadlineInfo {
                    course_name: course.name.clone(),
                    deadline,
                    days_left,
                });
            }
        }

        Self {
            total,
            completed,
            in_progress,
            not_started: total - completed - in_progress,
            completion_rate: percent(completed as f64, total as f64),
            average_progress: if total > 0 { (progress_sum as f64) / (total as f64) } else { 0.0 },
            remaining_percent: percent(remaining_sum as f64, (total as f64) * 100.0),
            nearest_deadline,
            overdue,
        }
    }
}

/// Renders the progress snapshot used for tracking questions.
pub fn build_tracking_context(progress: &UserProgress, today: NaiveDate) -> String {
    let summary = ProgressSummary::compute(progress, today);
    let mut out = String::new();

    // Writing into a String cannot fail.
    let _ = writeln!(out, "USER PROGRESS DATA:");
    let _ = writeln!(out, "- Name: {}", progress.name);
    let _ = writeln!(out, "- Learning Path: {}", progress.learning_path.as_deref().unwrap_or("-"));

    let _ = writeln!(out, "\nKEY STATISTICS:");
    let _ = writeln!(out, "- Total courses: {}", summary.total);
    let _ = writeln!(
        out,
        "- Completed: {} courses ({:.1}%)",
        summary.completed,
        summary.completion_rate
    );
    let _ = writeln!(out, "- In progress: {} courses", summary.in_progress);
    let _ = writeln!(out, "- Not started: {} courses", summary.not_started);
    let _ = writeln!(out, "- Average progress: {:.1}%", summary.average_progress);
    let _ = writeln!(out, "- Remaining progress: {:.1}%", summary.remaining_percent);

    let _ = writeln!(out, "\nDEADLINE INSIGHT:");
    if let Some(nearest) = &summary.nearest_deadline {
        let _ = writeln!(
            out,
            "- Nearest deadline: {} ({} days left)",
            nearest.course_name,
            nearest.days_left
        );
    }
    if summary.overdue.is_empty() {
        let _ = writeln!(out, "- No overdue courses");
    } else {
        let _ = writeln!(out, "- Overdue courses:");
        for course in &summary.overdue {
            let _ = writeln!(out, "  - {} ({} days overdue)", course.course_name, course.days_overdue);
        }
    }

    let _ = writeln!(out, "\nCOURSE DETAILS:");
    if summary.completed > 0 {
        let _ = writeln!(out, "\nCOMPLETED COURSES:");
        for course in progress.courses.iter().filter(|c| c.progress >= 100) {
            let _ = writeln!(out, "  - {}", course.name);
        }
    }
    if summary.in_progress > 0 {
        let _ = writeln!(out, "\nIN PROGRESS:");
        for course in progress.courses.iter().filter(|c| c.progress > 0 && c.progress < 100) {
            let days = parse_deadline(course)
                .map(|d| format!(" | {} days to deadline", (d - today).num_days()))
                .unwrap_or_default();
            let _ = writeln!(out, "  - {}: {}%{}", course.name, course.progress, days);
        }
    }
    if summary.not_started > 0 {
        let _ = writeln!(out, "\nNOT STARTED: {} courses", summary.not_started);
    }

    out
}
