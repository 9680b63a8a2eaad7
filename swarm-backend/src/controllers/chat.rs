use crate::multi_agent::{ChatMessage, OrchestrationError, OrchestrationRequest};
use crate::AppState;
use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/chat").route(web::post().to(chat)));
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
    /// Restrict routing to these agents; all enabled agents when absent
    #[serde(default)]
    pub agents: Option<Vec<String>>,
    #[serde(default)]
    pub has_upload: bool,
}

/// A dropped connection drops this future, which abandons in-flight subtasks
async fn chat(state: web::Data<AppState>, body: web::Json<ChatRequest>) -> impl Responder {
    let body = body.into_inner();
    if body.message.trim().is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "Message cannot be empty"
        }));
    }

    let candidates = match &body.agents {
        Some(names) => match state.catalog.select(names) {
            Ok(selected) => selected,
            Err(e) => {
                return HttpResponse::BadRequest().json(serde_json::json!({
                    "error": e.to_string()
                }));
            }
        },
        None => state.catalog.enabled(),
    };

    let request = OrchestrationRequest::new(body.message)
        .with_history(body.history)
        .with_upload(body.has_upload);
    let cancel = state.shutdown.child_token();

    match state
        .orchestrator
        .orchestrate_request(request, &candidates, &cancel)
        .await
    {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(OrchestrationError::Cancelled) => {
            log::info!("[CHAT] Request cancelled by shutdown");
            HttpResponse::ServiceUnavailable().json(serde_json::json!({
                "error": "Server is shutting down"
            }))
        }
        Err(e) => {
            log::error!("[CHAT] Orchestration failed: {}", e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }))
        }
    }
}
