//! Remote user progress: the data behind tracking answers.

use async_trait::async_trait;
use log::{ debug, warn };
use reqwest::Client as HttpClient;
use serde::de::Error as _;
use serde::{ Deserialize, Deserializer, Serialize };
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_LEARNING_PATH_LABEL: &str = "Learning Path";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseProgress {
    pub id: Option<i64>,
    pub name: String,
    pub progress: u8,
    pub deadline: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProgress {
    pub name: String,
    pub learning_path: Option<String>,
    pub courses: Vec<CourseProgress>,
}

#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("user '{0}' not found in progress data")]
    NotFound(String),
    #[error("progress API unreachable: {0}")]
    Unreachable(String),
    #[error("malformed progress data: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait ProgressSource: Send + Sync {
    async fn fetch(&self, user_id: &str) -> Result<UserProgress, ProgressError>;
}

/// Accepts `75`, `75.9` or `"75"`; null and blank strings count as zero. Result is clamped to 0..=100.
fn lenient_progress<'de, D>(deserializer: D) -> Result<u8, D::Error> where D: Deserializer<'de> {
    let value = Option::<Value>::deserialize(deserializer)?;
    let raw = match value {
        None | Some(Value::Null) => 0.0,
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) if s.trim().is_empty() => 0.0,
        Some(Value::String(s)) =>
            s
                .trim()
                .parse::<f64>()
                .map_err(|_| D::Error::custom(format!("progress is not a number: {:?}", s)))?,
        Some(other) => {
            return Err(D::Error::custom(format!("progress is not a number: {}", other)));
        }
    };
    if raw.is_nan() {
        return Err(D::Error::custom("progress is not a number: NaN"));
    }
    Ok(raw.trunc().clamp(0.0, 100.0) as u8)
}

fn lenient_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error> where D: Deserializer<'de> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

#[derive(Deserialize)]
struct ApiPayload {
    #[serde(default)]
    users: Vec<ApiUser>,
}

#[derive(Deserialize)]
struct ApiUser {
    #[serde(rename = "_id")]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    classes: Vec<ApiClass>,
}

#[derive(Deserialize)]
struct ApiClass {
    #[serde(default, deserialize_with = "lenient_id")]
    course_id: Option<i64>,
    #[serde(default)]
    course_name: String,
    #[serde(default, deserialize_with = "lenient_progress")]
    progress: u8,
    #[serde(default)]
    deadline: Option<String>,
}

/// Picks `user_id` out of an API response body.
pub fn parse_user_progress(body: &str, user_id: &str) -> Result<UserProgress, ProgressError> {
    let payload: ApiPayload = serde_json::from_str(body)
        .map_err(|e| ProgressError::Malformed(e.to_string()))?;

    let user = payload.users
        .into_iter()
        .find(|u| u.id == user_id)
        .ok_or_else(|| ProgressError::NotFound(user_id.to_string()))?;

    Ok(UserProgress {
        name: user.name,
        learning_path: Some(DEFAULT_LEARNING_PATH_LABEL.to_string()),
        courses: user.classes
            .into_iter()
            .map(|c| CourseProgress {
                id: c.course_id,
                name: c.course_name,
                progress: c.progress,
                deadline: c.deadline.filter(|d| !d.trim().is_empty()),
            })
            .collect(),
    })
}

pub struct HttpProgressSource {
    http: HttpClient,
    url: String,
}

impl HttpProgressSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ProgressError> {
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProgressError::Unreachable(e.to_string()))?;
        Ok(Self { http, url: url.into() })
    }
}

#[async_trait]
impl ProgressSource for HttpProgressSource {
    async fn fetch(&self, user_id: &str) -> Result<UserProgress, ProgressError> {
        debug!("Fetching progress for user {} from {}", user_id, self.url);
        let resp = self.http
            .get(&self.url)
            .send().await
            .map_err(|e| ProgressError::Unreachable(e.to_string()))?;

        if !resp.status().is_success() {
            warn!("Progress API returned {}", resp.status());
            return Err(ProgressError::Unreachable(format!("HTTP {}", resp.status())));
        }

        let body = resp.text().await.map_err(|e| ProgressError::Unreachable(e.to_string()))?;
        parse_user_progress(&body, user_id)
    }
}
