//! Router, shared state and server startup.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::agent::{Agent, Domain};
use crate::config::Config;
use crate::data::{StudentStore, WeatherStore};
use crate::llm::{LlmClient, OllamaClient};
use crate::tools::ToolRegistry;

use super::types::{ErrorResponse, HealthResponse};
use super::{chat, records};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub llm: Arc<dyn LlmClient>,
    pub weather: Agent,
    pub students: Agent,
    pub student_store: StudentStore,
}

impl AppState {
    /// Wire both agents to `llm` and the given stores.
    pub fn new(
        config: Config,
        llm: Arc<dyn LlmClient>,
        weather_store: Arc<WeatherStore>,
        student_store: StudentStore,
    ) -> Self {
        let weather = Agent::new(
            Domain::Weather.profile(),
            Arc::clone(&llm),
            Arc::new(ToolRegistry::weather(weather_store)),
            &config,
        );
        let students = Agent::new(
            Domain::Students.profile(),
            Arc::clone(&llm),
            Arc::new(ToolRegistry::students(student_store.clone())),
            &config,
        );
        Self {
            config,
            llm,
            weather,
            students,
            student_store,
        }
    }

    /// Build the production state: Ollama client, bundled weather data, SQLite student store.
    pub async fn from_config(config: Config) -> anyhow::Result<Self> {
        let llm: Arc<dyn LlmClient> = Arc::new(OllamaClient::from_config(&config));
        let weather_store = Arc::new(WeatherStore::bundled()?);

        let student_store = match &config.student_db_path {
            Some(path) => {
                tracing::info!(path = %path.display(), "Opening student database");
                StudentStore::open(path)?
            }
            None => {
                tracing::info!("Using in-memory student database");
                StudentStore::in_memory()?
            }
        };
        if config.seed_students {
            let seeded = student_store.seed_if_empty().await?;
            if seeded > 0 {
                tracing::info!(count = seeded, "Seeded demo student records");
            }
        }

        Ok(Self::new(config, llm, weather_store, student_store))
    }

    pub fn agent(&self, domain: Domain) -> &Agent {
        match domain {
            Domain::Weather => &self.weather,
            Domain::Students => &self.students,
        }
    }
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health))
        .route("/api/weather/tools", get(chat::weather_tools))
        .route("/api/weather/chat", post(chat::weather_chat))
        .route("/api/students/tools", get(chat::students_tools))
        .route("/api/students/chat", post(chat::students_chat))
        .route("/api/students", post(records::create_student))
        .route(
            "/api/students/:id",
            get(records::get_student)
                .put(records::update_student)
                .delete(records::delete_student),
        )
        .route("/api/students/:id/marks", post(records::add_marks))
        .route(
            "/api/marks/:id",
            axum::routing::put(records::update_marks).delete(records::delete_marks),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState::from_config(config).await?);
    let app = router(state);

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model_backend_reachable: state.llm.health_check().await,
    })
}

pub(super) fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::llm::LlmError;

    struct ScriptedLlm {
        replies: Mutex<VecDeque<Result<String, LlmError>>>,
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn generate(&self, _model: &str, _prompt: &str) -> Result<String, LlmError> {
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(LlmError::Transport("script exhausted".to_string())))
        }
    }

    async fn app(replies: Vec<Result<String, LlmError>>) -> Router {
        let config = Config::new("http://stub.invalid".to_string(), "llama2".to_string());
        let llm = Arc::new(ScriptedLlm {
            replies: Mutex::new(replies.into()),
        });
        let students = StudentStore::in_memory().unwrap();
        students.seed_if_empty().await.unwrap();
        let state = AppState::new(
            config,
            llm,
            Arc::new(WeatherStore::bundled().unwrap()),
            students,
        );
        router(Arc::new(state))
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn final_reply(text: &str) -> Result<String, LlmError> {
        Ok(json!({"needsMoreTools": false, "finalResponse": text}).to_string())
    }

    fn city_lookup(city: &str) -> Result<String, LlmError> {
        Ok(json!({
            "needsMoreTools": true,
            "toolCalls": [{"tool": "fetchWeatherByCity", "parameters": {"city": city}}]
        })
        .to_string())
    }

    #[tokio::test]
    async fn health_reports_backend() {
        let app = app(vec![]).await;
        let (status, body) = send(&app, "GET", "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["model_backend_reachable"], true);
    }

    #[tokio::test]
    async fn tool_catalogues_per_domain() {
        let app = app(vec![]).await;
        let (status, weather) = send(&app, "GET", "/api/weather/tools", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(weather.as_array().unwrap().len(), 3);
        assert_eq!(weather[1]["name"], "getCitiesByAQI");

        let (_, students) = send(&app, "GET", "/api/students/tools", None).await;
        assert_eq!(students.as_array().unwrap().len(), 10);
    }

    #[tokio::test]
    async fn blank_prompt_is_rejected() {
        let app = app(vec![]).await;
        let (status, body) = send(&app, "POST", "/api/weather/chat", Some(json!({"prompt": "   "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Prompt is required");
    }

    #[tokio::test]
    async fn chat_echoes_model_override_or_default() {
        let app = app(vec![
            city_lookup("delhi"),
            final_reply("Delhi is hot today."),
            final_reply("Still hot."),
        ])
        .await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/weather/chat",
            Some(json!({"prompt": "Weather in Delhi", "model": "mistral"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["model"], "mistral");
        assert_eq!(body["response"], "Delhi is hot today.");
        assert_eq!(body["iterations"], 2);
        assert_eq!(body["tools_used"], 1);
        assert_eq!(body["tool_results"][0]["result"]["city"], "Delhi");

        let (_, body) = send(
            &app,
            "POST",
            "/api/weather/chat",
            Some(json!({"prompt": "Weather in Delhi again"})),
        )
        .await;
        assert_eq!(body["model"], "llama2");
    }

    #[tokio::test]
    async fn off_topic_prompt_is_declined() {
        let app = app(vec![]).await;
        let (status, body) = send(&app, "POST", "/api/weather/chat", Some(json!({"prompt": "What is 2+2?"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["in_domain"], false);
        assert_eq!(body["iterations"], 0);
        assert_eq!(body["status"], "declined");
    }

    #[tokio::test]
    async fn model_failure_is_bad_gateway_with_trace() {
        let app = app(vec![
            city_lookup("mumbai"),
            Err(LlmError::Transport("connection reset".to_string())),
        ])
        .await;

        let (status, body) = send(&app, "POST", "/api/weather/chat", Some(json!({"prompt": "Weather in Mumbai"}))).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["success"], false);
        assert_eq!(body["model"], "llama2");
        assert_eq!(body["iterations"], 2);
        assert_eq!(body["tools_used"], 1);
        assert_eq!(body["tool_results"][0]["tool"], "fetchWeatherByCity");
        assert!(body["error"].as_str().unwrap().contains("connection reset"));
        assert!(!body["message"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn model_timeout_is_gateway_timeout() {
        let app = app(vec![Err(LlmError::Timeout)]).await;
        let (status, body) = send(&app, "POST", "/api/students/chat", Some(json!({"prompt": "How many students are there?"}))).await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body["iterations"], 1);
        assert_eq!(body["tools_used"], 0);
    }

    #[tokio::test]
    async fn student_records_map_store_errors() {
        let app = app(vec![]).await;

        let (status, body) = send(&app, "GET", "/api/students/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Vivek Sharma");

        let (status, _) = send(&app, "GET", "/api/students/999", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, "PUT", "/api/students/1", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, "PUT", "/api/students/999", Some(json!({"email": "x@example.edu"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let duplicate = json!({
            "name": "Someone Else",
            "roll_number": "CS2021001",
            "department": "Physics",
            "class_year": 1,
            "email": "someone@example.edu"
        });
        let (status, _) = send(&app, "POST", "/api/students", Some(duplicate)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = send(
            &app,
            "POST",
            "/api/students/999/marks",
            Some(json!({"subject": "Physics", "marks": 70.0, "semester": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, "DELETE", "/api/marks/9999", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn student_and_marks_lifecycle() {
        let app = app(vec![]).await;

        let new = json!({
            "name": "Meera Iyer",
            "roll_number": "EE2024001",
            "department": "Electrical Engineering",
            "class_year": 1,
            "email": "meera.iyer@example.edu"
        });
        let (status, student) = send(&app, "POST", "/api/students", Some(new)).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = student["id"].as_i64().unwrap();

        let (status, mark) = send(
            &app,
            "POST",
            &format!("/api/students/{}/marks", id),
            Some(json!({"subject": "Circuits", "marks": 72.5, "semester": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let mark_id = mark["id"].as_i64().unwrap();

        let (status, updated) = send(&app, "PUT", &format!("/api/marks/{}", mark_id), Some(json!({"marks": 80.0}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["marks"], 80.0);

        let (status, _) = send(&app, "DELETE", &format!("/api/students/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, "GET", &format!("/api/students/{}", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
