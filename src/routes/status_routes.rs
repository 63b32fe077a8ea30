// src/routes/status_routes.rs

use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::models::AppState;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub timestamp: String,
    pub database: &'static str,
    pub endpoints: StatusEndpoints,
}

#[derive(Debug, Serialize)]
pub struct StatusEndpoints {
    pub pacientes: &'static str,
    pub medicos: &'static str,
    pub turnos: &'static str,
    pub status: &'static str,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/status", get(api_status))
}

/// Unauthenticated health payload for monitoring and the frontend's API probe.
pub async fn api_status() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "success",
        message: "API funcionando correctamente",
        timestamp: chrono::Utc::now().to_rfc3339(),
        database: "PostgreSQL",
        endpoints: StatusEndpoints {
            pacientes: "/api/pacientes",
            medicos: "/api/medicos",
            turnos: "/api/turnos",
            status: "/api/status",
        },
    })
}
