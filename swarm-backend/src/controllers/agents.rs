use crate::agents::AgentHealth;
use crate::AppState;
use actix_web::{web, HttpResponse, Responder};
use serde::Serialize;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/agents").route(web::get().to(list_agents)));
    cfg.service(web::resource("/api/tools").route(web::get().to(list_tools)));
}

#[derive(Serialize)]
struct AgentSummary<'a> {
    name: &'a str,
    human_readable_name: &'a str,
    command: String,
    description: &'a str,
    tools: &'a [String],
    upload_required: bool,
    is_enabled: bool,
    remote: bool,
    /// `None` for disabled agents, which are never built
    health: Option<AgentHealth>,
}

async fn list_agents(state: web::Data<AppState>) -> impl Responder {
    let agents: Vec<AgentSummary> = state
        .catalog
        .all()
        .iter()
        .map(|d| AgentSummary {
            name: &d.name,
            human_readable_name: &d.human_readable_name,
            command: format!("/{}", d.command_key()),
            description: &d.description,
            tools: &d.tools,
            upload_required: d.upload_required,
            is_enabled: d.is_enabled,
            remote: d.is_mcp(),
            health: state.roster.get(&d.name).map(|a| a.health()),
        })
        .collect();
    HttpResponse::Ok().json(agents)
}

async fn list_tools(state: web::Data<AppState>) -> impl Responder {
    let tools: Vec<serde_json::Value> = state
        .tool_registry
        .list()
        .iter()
        .map(|handle| {
            serde_json::json!({
                "name": handle.name(),
                "category": handle.category(),
                "qualified_name": handle.qualified_name(),
                "description": handle.definition().description,
                "input_schema": handle.definition().input_schema,
            })
        })
        .collect();
    HttpResponse::Ok().json(tools)
}
