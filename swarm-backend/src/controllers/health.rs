use crate::AppState;
use actix_web::{web, HttpResponse, Responder};

/// Version from Cargo.toml, available at compile time
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/health").route(web::get().to(health_check)));
    cfg.service(web::resource("/api/version").route(web::get().to(get_version)));
}

async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let degraded: Vec<String> = state
        .roster
        .health()
        .into_iter()
        .filter(|(_, h)| matches!(h, crate::agents::AgentHealth::Degraded(_)))
        .map(|(name, _)| name)
        .collect();

    HttpResponse::Ok().json(serde_json::json!({
        "status": if degraded.is_empty() { "ok" } else { "degraded" },
        "version": VERSION,
        "agents": state.roster.len(),
        "tools": state.tool_registry.len(),
        "degraded_agents": degraded,
        "limits": {
            "max_subtasks": state.config.max_subtasks,
            "subtask_timeout_secs": state.config.subtask_timeout_secs,
        },
    }))
}

async fn get_version() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "version": VERSION
    }))
}
