//! Context snapshots: natural-language blocks describing domain data for a prompt.

pub mod recommendation;
pub mod tracking;

pub use recommendation::{ build_recommendation_context, DEFAULT_CONTEXT_COURSE_LIMIT };
pub use tracking::{ build_tracking_context, ProgressSummary };
