use crate::models::AppState;
use axum::Router;

pub mod appointment_routes;
pub mod auth_routes;
pub mod doctor_routes;
pub mod patient_routes;
pub mod status_routes;
pub mod user_routes;
pub mod view_routes;

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api/auth", auth_routes::router())
        .nest("/api/pacientes", patient_routes::router())
        .nest("/api/medicos", doctor_routes::router())
        .nest("/api/turnos", appointment_routes::router())
        .nest("/api/usuarios", user_routes::router())
        .merge(status_routes::router())
        .merge(view_routes::router())
        .with_state(state)
}
