use crate::agent::AIAgent;
use crate::catalog::recommend::{ CourseRecommendation, DEFAULT_RECOMMENDATION_LIMIT };
use crate::catalog::{ Course, CourseLevel, LearningPath };
use crate::context::ProgressSummary;
use crate::error::AssistantError;
use crate::llm::LlmError;
use crate::models::chat::{ Category, ChatMessage, SessionSummary };
use crate::progress::CourseProgress;
use std::sync::Arc;
use axum::{
    routing::{ delete, get, post },
    Json,
    Router,
    extract::{ Path, Query, State },
    response::{ IntoResponse, Response },
    http::StatusCode,
};
use serde::{ Deserialize, Serialize };
use serde_json::json;
use tower_http::cors::{ Any, CorsLayer };
use uuid::Uuid;
use log::{ error, info, warn };

const SERVICE_NAME: &str = "Personal Learning Assistant";

#[derive(Clone)]
struct AppState {
    agent: Arc<AIAgent>,
}

#[derive(Deserialize)]
pub struct ChatRequest {
    pub query: String,
    pub session_id: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Serialize)]
struct ChatResponse {
    answer: String,
    #[serde(rename = "type")]
    category: Category,
    session_id: String,
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Serialize)]
struct HistoryResponse {
    session_id: String,
    messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
pub struct RecommendationQuery {
    pub limit: Option<usize>,
    pub learning_path: Option<String>,
    pub level: Option<i64>,
}

#[derive(Serialize)]
struct RecommendationResponse {
    recommendations: Vec<CourseRecommendation>,
    learning_paths_count: usize,
    courses_count: usize,
}

#[derive(Deserialize)]
pub struct UserQuery {
    pub user_id: Option<String>,
}

#[derive(Serialize)]
struct ProgressResponse {
    user_name: String,
    learning_path: Option<String>,
    total_courses: usize,
    completed_courses: usize,
    in_progress_courses: usize,
    completed_names: Vec<String>,
    in_progress_details: Vec<CourseProgress>,
}

#[derive(Deserialize)]
pub struct CoursesQuery {
    pub learning_path_id: Option<i64>,
}

#[derive(Deserialize)]
pub struct ReloadRequest {
    pub name: Option<String>,
}

#[derive(Serialize)]
struct ReloadResponse {
    success: bool,
    message: String,
    details: Option<Vec<String>>,
}

fn status_for(err: &AssistantError) -> StatusCode {
    match err {
        AssistantError::InvalidRequest(_) | AssistantError::InvalidSession(_) => {
            StatusCode::BAD_REQUEST
        }
        AssistantError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        AssistantError::ContentBlocked(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AssistantError::DataSourceUnavailable(_) => StatusCode::BAD_GATEWAY,
        AssistantError::GatewayExhausted { .. }
        | AssistantError::Llm(LlmError::RateLimited(_))
        | AssistantError::ClassificationFailure(LlmError::RateLimited(_))
        | AssistantError::ClassificationFailure(LlmError::Exhausted { .. }) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AssistantError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        if status.is_server_error() {
            error!("Request failed ({}): {}", self.kind(), self);
        } else {
            warn!("Request rejected ({}): {}", self.kind(), self);
        }
        (status, Json(json!({ "error": self.kind(), "message": self.to_string() }))).into_response()
    }
}

/// All HTTP routes over a shared agent, with permissive CORS.
pub fn router(agent: Arc<AIAgent>) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/chat", post(chat_handler))
        .route("/history", delete(clear_all_history_handler))
        .route("/history/{session_id}", get(history_handler).delete(delete_history_handler))
        .route("/sessions", get(sessions_handler))
        .route("/recommendations", get(recommendations_handler))
        .route("/recommendations/next", get(next_recommendation_handler))
        .route("/learning-paths", get(learning_paths_handler))
        .route("/learning-paths/{name}/overview", get(overview_handler))
        .route("/progress", get(progress_handler))
        .route("/progress/summary", get(progress_summary_handler))
        .route("/courses", get(courses_handler))
        .route("/course-levels", get(course_levels_handler))
        .route("/health", get(health_handler))
        .route("/api/reload-prompts", post(reload_prompts_handler))
        .route("/api/reload-catalog", post(reload_catalog_handler))
        .layer(cors)
        .with_state(AppState { agent })
}

async fn chat_handler(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>
) -> Result<Json<ChatResponse>, AssistantError> {
    let session_id = req.session_id
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let outcome = state.agent.process_message(
        &req.query,
        Some(&session_id),
        req.user_id.as_deref()
    ).await?;

    Ok(
        Json(ChatResponse {
            answer: outcome.answer,
            category: outcome.category,
            session_id,
        })
    )
}

async fn history_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(query): Query<HistoryQuery>
) -> Result<Json<HistoryResponse>, AssistantError> {
    let messages = state.agent.history(&session_id, query.limit).await?;
    Ok(Json(HistoryResponse { session_id, messages }))
}

async fn delete_history_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>
) -> Result<impl IntoResponse, AssistantError> {
    state.agent.delete_session(&session_id).await?;
    Ok(Json(json!({ "message": "History cleared successfully", "session_id": session_id })))
}

async fn clear_all_history_handler(
    State(state): State<AppState>
) -> Result<impl IntoResponse, AssistantError> {
    let deleted_count = state.agent.clear_history().await?;
    Ok(
        Json(
            json!({
                "message": format!("Cleared {} session(s)", deleted_count),
                "deleted_count": deleted_count,
            })
        )
    )
}

async fn sessions_handler(
    State(state): State<AppState>
) -> Result<Json<Vec<SessionSummary>>, AssistantError> {
    Ok(Json(state.agent.list_sessions().await?))
}

async fn recommendations_handler(
    State(state): State<AppState>,
    Query(query): Query<RecommendationQuery>
) -> Json<RecommendationResponse> {
    let catalog = state.agent.catalog();
    let recommendations = state.agent.recommend(
        query.learning_path.as_deref(),
        query.level,
        query.limit.unwrap_or(DEFAULT_RECOMMENDATION_LIMIT)
    );
    Json(RecommendationResponse {
        recommendations,
        learning_paths_count: catalog.learning_paths().len(),
        courses_count: catalog.courses().len(),
    })
}

async fn next_recommendation_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.agent.recommend(None, None, 1).into_iter().next() {
        Some(recommendation) =>
            Json(json!({ "message": "Next recommended course", "recommendation": recommendation })),
        None => Json(json!({ "message": "No recommendations available", "recommendation": null })),
    }
}

async fn overview_handler(
    State(state): State<AppState>,
    Path(name): Path<String>
) -> impl IntoResponse {
    let overview = state.agent.learning_path_overview(&name);
    Json(json!({ "learning_path": name, "overview": overview }))
}

async fn progress_handler(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>
) -> Result<Json<ProgressResponse>, AssistantError> {
    let progress = state.agent.fetch_progress(query.user_id.as_deref()).await?;
    let summary = ProgressSummary::compute(&progress, AIAgent::today());

    Ok(
        Json(ProgressResponse {
            completed_names: progress.courses
                .iter()
                .filter(|c| c.progress >= 100)
                .map(|c| c.name.clone())
                .collect(),
            in_progress_details: progress.courses
                .iter()
                .filter(|c| c.progress > 0 && c.progress < 100)
                .cloned()
                .collect(),
            user_name: progress.name,
            learning_path: progress.learning_path,
            total_courses: summary.total,
            completed_courses: summary.completed,
            in_progress_courses: summary.in_progress,
        })
    )
}

async fn progress_summary_handler(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>
) -> Result<impl IntoResponse, AssistantError> {
    let progress = state.agent.fetch_progress(query.user_id.as_deref()).await?;
    let summary = ProgressSummary::compute(&progress, AIAgent::today());

    Ok(
        Json(
            json!({
                "user_name": progress.name,
                "learning_path": progress.learning_path,
                "completion_rate": format!("{:.1}%", summary.completion_rate),
                "average_progress": format!("{:.1}%", summary.average_progress),
                "courses_completed": summary.completed,
                "courses_total": summary.total,
                "nearest_deadline": summary.nearest_deadline,
                "overdue": summary.overdue,
            })
        )
    )
}

async fn courses_handler(
    State(state): State<AppState>,
    Query(query): Query<CoursesQuery>
) -> impl IntoResponse {
    let catalog = state.agent.catalog();
    let courses: Vec<Course> = match query.learning_path_id {
        Some(id) => catalog.courses_in_path(id).into_iter().cloned().collect(),
        None => catalog.courses().to_vec(),
    };
    Json(json!({ "total": courses.len(), "courses": courses }))
}

async fn learning_paths_handler(State(state): State<AppState>) -> impl IntoResponse {
    let catalog = state.agent.catalog();
    let paths: &[LearningPath] = catalog.learning_paths();
    Json(json!({ "total": paths.len(), "learning_paths": paths }))
}

async fn course_levels_handler(State(state): State<AppState>) -> impl IntoResponse {
    let catalog = state.agent.catalog();
    let levels: &[CourseLevel] = catalog.course_levels();
    Json(json!({ "total": levels.len(), "levels": levels }))
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let catalog = state.agent.catalog();
    Json(
        json!({
            "status": "ok",
            "service": SERVICE_NAME,
            "version": env!("CARGO_PKG_VERSION"),
            "features": ["direct_llm", "tracking", "recommendation", "history"],
            "data_stats": {
                "courses": catalog.courses().len(),
                "learning_paths": catalog.learning_paths().len(),
                "course_levels": catalog.course_levels().len(),
            }
        })
    )
}

async fn reload_prompts_handler(
    State(state): State<AppState>,
    Query(req): Query<ReloadRequest>
) -> impl IntoResponse {
    match state.agent.reload_prompts(req.name.as_deref()) {
        Ok(names) => {
            info!("Prompt templates reloaded: {:?}", names);
            (
                StatusCode::OK,
                Json(ReloadResponse {
                    success: true,
                    message: "Reload complete".into(),
                    details: Some(
                        names
                            .into_iter()
                            .map(str::to_string)
                            .collect()
                    ),
                }),
            ).into_response()
        }
        Err(e) =>
            (
                StatusCode::BAD_REQUEST,
                Json(ReloadResponse {
                    success: false,
                    message: "Reload errors".into(),
                    details: Some(vec![e.to_string()]),
                }),
            ).into_response(),
    }
}

async fn reload_catalog_handler(State(state): State<AppState>) -> impl IntoResponse {
    let catalog = state.agent.reload_catalog();
    Json(ReloadResponse {
        success: true,
        message: "Catalog reloaded".into(),
        details: Some(
            vec![
                format!("courses: {}", catalog.courses().len()),
                format!("learning_paths: {}", catalog.learning_paths().len()),
                format!("course_levels: {}", catalog.course_levels().len())
            ]
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ agent_harness, sample_progress, AgentHarness, FixedProgress };
    use axum::body::{ to_bytes, Body };
    use axum::http::{ Method, Request };
    use serde_json::Value;
    use tower::ServiceExt;

    fn app(h: &AgentHarness) -> Router {
        router(Arc::new(h.agent.clone()))
    }

    async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) =>
                builder
                    .header("content-type", "application/json")
                    .body(Body::from(json.to_string()))
                    .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    #[tokio::test]
    async fn chat_generates_session_and_persists() {
        let h = agent_harness(vec![Ok("learning".into()), Ok("Ownership moves values".into())], None);

        let (status, body) = send(
            app(&h),
            Method::POST,
            "/chat",
            Some(json!({ "query": "What is ownership?" }))
        ).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["type"], "learning");
        assert_eq!(body["answer"], "Ownership moves values");
        let session_id = body["session_id"].as_str().unwrap();
        assert!(Uuid::parse_str(session_id).is_ok());

        let (status, history) = send(app(&h), Method::GET, &format!("/history/{}", session_id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(history["messages"].as_array().unwrap().len(), 1);
        assert_eq!(history["messages"][0]["type"], "learning");
    }

    #[tokio::test]
    async fn chat_errors_map_to_status_codes() {
        let h = agent_harness(
            vec![Ok("learning".into()), Err(LlmError::ContentBlocked("SAFETY".into()))],
            None
        );

        let (status, body) = send(app(&h), Method::POST, "/chat", Some(json!({ "query": "  " }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_request");

        let (status, body) = send(
            app(&h),
            Method::POST,
            "/chat",
            Some(json!({ "query": "bad", "session_id": "s1" }))
        ).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "content_blocked");
    }

    #[tokio::test]
    async fn deleting_unknown_session_is_404() {
        let h = agent_harness(vec![], None);
        let (status, body) = send(app(&h), Method::DELETE, "/history/nobody", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "session_not_found");
    }

    #[tokio::test]
    async fn sessions_listing_and_bulk_clear() {
        let h = agent_harness(
            vec![Ok("learning".into()), Ok("a".into()), Ok("learning".into()), Ok("b".into())],
            None
        );
        for id in ["s1", "s2"] {
            h.agent.process_message("q", Some(id), None).await.unwrap();
        }

        let (_, sessions) = send(app(&h), Method::GET, "/sessions", None).await;
        assert_eq!(sessions.as_array().unwrap().len(), 2);

        let (status, body) = send(app(&h), Method::DELETE, "/history", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["deleted_count"], 2);
    }

    #[tokio::test]
    async fn recommendations_filter_and_count() {
        let h = agent_harness(vec![], None);

        let (_, body) = send(
            app(&h),
            Method::GET,
            "/recommendations?learning_path=Android%20Developer&limit=2",
            None
        ).await;
        let recs = body["recommendations"].as_array().unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0]["level_name"], "Beginner");
        assert_eq!(body["courses_count"], 4);
        assert_eq!(body["learning_paths_count"], 2);

        let (_, next) = send(app(&h), Method::GET, "/recommendations/next", None).await;
        assert_eq!(next["recommendation"]["course_name"], "Kotlin Basics");
    }

    #[tokio::test]
    async fn catalog_listings() {
        let h = agent_harness(vec![], None);

        let (_, courses) = send(app(&h), Method::GET, "/courses?learning_path_id=2", None).await;
        assert_eq!(courses["total"], 1);
        let (_, paths) = send(app(&h), Method::GET, "/learning-paths", None).await;
        assert_eq!(paths["total"], 2);
        let (_, levels) = send(app(&h), Method::GET, "/course-levels", None).await;
        assert_eq!(levels["levels"][0]["course_level"], "Beginner");

        let (_, overview) = send(
            app(&h),
            Method::GET,
            "/learning-paths/Web%20Developer/overview",
            None
        ).await;
        assert!(overview["overview"].as_str().unwrap().contains("  - Web Basics"));

        let (_, health) = send(app(&h), Method::GET, "/health", None).await;
        assert_eq!(health["status"], "ok");
        assert_eq!(health["data_stats"]["courses"], 4);
    }

    #[tokio::test]
    async fn progress_endpoints() {
        let h = agent_harness(vec![], Some(FixedProgress(Some(sample_progress()))));

        let (status, progress) = send(app(&h), Method::GET, "/progress?user_id=u-1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(progress["completed_courses"], 1);
        assert_eq!(progress["completed_names"][0], "Kotlin Basics");
        assert_eq!(progress["in_progress_details"][0]["progress"], 40);

        let (_, summary) = send(app(&h), Method::GET, "/progress/summary", None).await;
        assert_eq!(summary["completion_rate"], "33.3%");
        assert_eq!(summary["average_progress"], "46.7%");
    }

    #[tokio::test]
    async fn progress_without_source_is_bad_gateway() {
        let h = agent_harness(vec![], None);
        let (status, body) = send(app(&h), Method::GET, "/progress", None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "data_source_unavailable");
    }

    #[tokio::test]
    async fn reload_endpoints() {
        let h = agent_harness(vec![], None);

        let (status, body) = send(app(&h), Method::POST, "/api/reload-prompts?name=learning", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["details"][0], "learning");

        let (status, _) = send(app(&h), Method::POST, "/api/reload-prompts?name=bogus", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(app(&h), Method::POST, "/api/reload-catalog", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
    }
}
