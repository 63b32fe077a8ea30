// src/routes/view_routes.rs
//
// The frontend's named views as JSON payloads. Every handler answers with a
// `view` key the renderer resolves to a page, the viewer's profile, and the
// data that page needs. A failed upstream fetch still answers 200 with the
// same view, empty collections and a visible `error` flag.

use axum::{extract::Query, extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{
    error::ApiError,
    middleware::auth_context::{AuthContext, OptionalAuthContext},
    models::{
        AppState, AppointmentRecord, DoctorRow, PatientRow, ProjectedAppointment, UserProfile,
        ROLE_ADMIN, ROLE_DOCTOR, ROLE_PATIENT,
    },
    projection::{self, ViewerContext, ViewerRole},
    routes::{
        appointment_routes::fetch_appointments_with_names,
        auth_routes::load_user_links,
        doctor_routes::fetch_all_doctors,
        patient_routes::fetch_all_patients,
    },
};

const FETCH_ERROR_INDEX: &str = "Error al obtener datos de la base de datos";
const FETCH_ERROR_DASHBOARD: &str = "Error al obtener datos";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index_view))
        .route("/pacientes", get(patients_view))
        .route("/medicos", get(doctors_view))
        .route("/turnos", get(appointments_view))
        .route("/usuarios", get(users_view))
        .route("/dashboard/medico", get(doctor_dashboard))
        .route("/dashboard/paciente", get(patient_dashboard))
        .route("/login", get(login_view))
        .route("/registro/paciente", get(registration_view))
}

fn ensure_admin(auth: &AuthContext) -> Result<(), ApiError> {
    if auth.role == ROLE_ADMIN {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "FORBIDDEN",
            "Only administrative staff can view this page".into(),
        ))
    }
}

/// Tail slice reversed: the `limit` most recently stored rows, newest first.
fn recent_rev<T: Clone>(rows: &[T], limit: usize) -> Vec<T> {
    let start = rows.len().saturating_sub(limit);
    rows[start..].iter().rev().cloned().collect()
}

/* ============================================================
   Admin dashboard (index)
   ============================================================ */

#[derive(Debug, Serialize)]
pub struct IndexViewResponse {
    pub data: IndexViewData,
}

#[derive(Debug, Serialize)]
pub struct IndexViewData {
    pub view: &'static str,
    pub title: &'static str,
    pub user: UserProfile,
    pub turnos: Vec<ProjectedAppointment>,
    pub pacientes: Vec<PatientRow>,
    pub medicos: Vec<DoctorRow>,
    pub metrics: DashboardMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DashboardMetrics {
    pub turnos: usize,
    pub pacientes: usize,
    pub medicos: usize,
}

async fn fetch_dashboard_data(
    state: &AppState,
) -> Result<(Vec<AppointmentRecord>, Vec<PatientRow>, Vec<DoctorRow>), ApiError> {
    let turnos = fetch_appointments_with_names(state).await?;
    let pacientes = fetch_all_patients(state).await?;
    let medicos = fetch_all_doctors(state).await?;
    Ok((turnos, pacientes, medicos))
}

pub async fn index_view(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<IndexViewResponse>, ApiError> {
    ensure_admin(&auth)?;
    let user = load_user_links(&state, auth.user_id).await?.profile();
    let limit = state.dashboard_recent_limit;

    let data = match fetch_dashboard_data(&state).await {
        Ok((turnos, pacientes, medicos)) => IndexViewData {
            view: "index",
            title: "Dashboard - Clínica Salud Integral",
            user,
            metrics: DashboardMetrics {
                turnos: turnos.len(),
                pacientes: pacientes.len(),
                medicos: medicos.len(),
            },
            turnos: projection::overview(&turnos, limit),
            pacientes: recent_rev(&pacientes, limit),
            medicos,
            error: None,
        },
        Err(e) => {
            tracing::error!("dashboard data fetch failed: {e:?}");
            IndexViewData {
                view: "index",
                title: "Dashboard - Clínica Salud Integral",
                user,
                turnos: vec![],
                pacientes: vec![],
                medicos: vec![],
                metrics: DashboardMetrics {
                    turnos: 0,
                    pacientes: 0,
                    medicos: 0,
                },
                error: Some(FETCH_ERROR_INDEX.to_string()),
            }
        }
    };

    Ok(Json(IndexViewResponse { data }))
}

/* ============================================================
   Role dashboards (medico / paciente)
   ============================================================ */

#[derive(Debug, Serialize)]
pub struct RoleDashboardResponse {
    pub data: RoleDashboardData,
}

#[derive(Debug, Serialize)]
pub struct RoleDashboardData {
    pub view: &'static str,
    pub title: &'static str,
    pub user: UserProfile,
    pub turnos: Vec<ProjectedAppointment>,
    pub metrics: RoleDashboardMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RoleDashboardMetrics {
    pub turnos: usize,
}

/// Shared shape of both role dashboards: resolve the viewer, fetch the full
/// turno set (degrading to empty on failure), project the upcoming subset.
/// The projector refuses viewers with no linked record even on the degraded
/// path, so a half-configured account never sees an unscoped list.
async fn role_dashboard(
    state: &AppState,
    auth: &AuthContext,
    view: &'static str,
    title: &'static str,
) -> Result<RoleDashboardData, ApiError> {
    let links = load_user_links(state, auth.user_id).await?;
    let viewer = match ViewerRole::from_code(auth.role) {
        Some(ViewerRole::Doctor) => ViewerContext::doctor(links.doctor_id),
        Some(ViewerRole::Patient) => ViewerContext::patient(links.patient_id),
        _ => {
            return Err(ApiError::Forbidden(
                "FORBIDDEN",
                "This dashboard is role-scoped".into(),
            ));
        }
    };

    let (records, error) = match fetch_appointments_with_names(state).await {
        Ok(records) => (records, None),
        Err(e) => {
            tracing::error!("turno fetch failed for {view}: {e:?}");
            (Vec::new(), Some(FETCH_ERROR_DASHBOARD.to_string()))
        }
    };

    let turnos = projection::upcoming(&records, &viewer, Utc::now())
        .map_err(|_| ApiError::unscoped_viewer())?;

    Ok(RoleDashboardData {
        view,
        title,
        user: links.profile(),
        metrics: RoleDashboardMetrics {
            turnos: turnos.len(),
        },
        turnos,
        error,
    })
}

pub async fn doctor_dashboard(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<RoleDashboardResponse>, ApiError> {
    if auth.role != ROLE_DOCTOR {
        return Err(ApiError::Forbidden(
            "FORBIDDEN",
            "Only medicos can view this dashboard".into(),
        ));
    }
    let data = role_dashboard(&state, &auth, "dashboardMedico", "Dashboard Médico").await?;
    Ok(Json(RoleDashboardResponse { data }))
}

pub async fn patient_dashboard(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<RoleDashboardResponse>, ApiError> {
    if auth.role != ROLE_PATIENT {
        return Err(ApiError::Forbidden(
            "FORBIDDEN",
            "Only pacientes can view this dashboard".into(),
        ));
    }
    let data = role_dashboard(&state, &auth, "dashboardPaciente", "Mi Dashboard").await?;
    Ok(Json(RoleDashboardResponse { data }))
}

/* ============================================================
   Management pages (data loads through /api)
   ============================================================ */

#[derive(Debug, Serialize)]
pub struct ManagementViewResponse {
    pub data: ManagementViewData,
}

#[derive(Debug, Serialize)]
pub struct ManagementViewData {
    pub view: &'static str,
    pub title: &'static str,
    pub user: UserProfile,
}

async fn management_view(
    state: &AppState,
    auth: &AuthContext,
    view: &'static str,
    title: &'static str,
) -> Result<Json<ManagementViewResponse>, ApiError> {
    let user = load_user_links(state, auth.user_id).await?.profile();
    Ok(Json(ManagementViewResponse {
        data: ManagementViewData { view, title, user },
    }))
}

pub async fn patients_view(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ManagementViewResponse>, ApiError> {
    management_view(&state, &auth, "pacientes", "Gestión de Pacientes").await
}

pub async fn doctors_view(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ManagementViewResponse>, ApiError> {
    management_view(&state, &auth, "medicos", "Gestión de Médicos").await
}

pub async fn appointments_view(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ManagementViewResponse>, ApiError> {
    management_view(&state, &auth, "turnos", "Gestión de Turnos").await
}

pub async fn users_view(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ManagementViewResponse>, ApiError> {
    ensure_admin(&auth)?;
    management_view(&state, &auth, "usuarios", "Gestión de Usuarios").await
}

/* ============================================================
   Public pages
   ============================================================ */

#[derive(Debug, Serialize)]
pub struct LoginViewResponse {
    pub data: LoginViewData,
}

#[derive(Debug, Serialize)]
pub struct LoginViewData {
    /// For an authenticated session this is the role's landing view, so the
    /// frontend can route past the login form.
    pub view: &'static str,
    pub title: &'static str,
    pub user: Option<UserProfile>,
}

pub async fn login_view(
    State(state): State<AppState>,
    OptionalAuthContext(auth): OptionalAuthContext,
) -> Result<Json<LoginViewResponse>, ApiError> {
    let data = match auth {
        Some(auth) => {
            let landing = match auth.role {
                ROLE_ADMIN => "index",
                ROLE_DOCTOR => "dashboardMedico",
                ROLE_PATIENT => "dashboardPaciente",
                _ => "login",
            };
            let user = load_user_links(&state, auth.user_id).await?.profile();
            LoginViewData {
                view: landing,
                title: "Iniciar Sesión",
                user: Some(user),
            }
        }
        None => LoginViewData {
            view: "login",
            title: "Iniciar Sesión",
            user: None,
        },
    };

    Ok(Json(LoginViewResponse { data }))
}

#[derive(Debug, Deserialize)]
pub struct RegistrationPrefillQuery {
    #[serde(default, rename = "googleEmail")]
    pub google_email: String,
    #[serde(default, rename = "googleFirstName")]
    pub google_first_name: String,
    #[serde(default, rename = "googleLastName")]
    pub google_last_name: String,
}

#[derive(Debug, Serialize)]
pub struct RegistrationViewResponse {
    pub data: RegistrationViewData,
}

#[derive(Debug, Serialize)]
pub struct RegistrationViewData {
    pub view: &'static str,
    pub title: &'static str,
    pub user: Option<UserProfile>,
    #[serde(rename = "googleEmail")]
    pub google_email: String,
    #[serde(rename = "googleFirstName")]
    pub google_first_name: String,
    #[serde(rename = "googleLastName")]
    pub google_last_name: String,
}

/// Public registration page; OAuth prefill parameters pass through verbatim.
pub async fn registration_view(
    Query(q): Query<RegistrationPrefillQuery>,
) -> Json<RegistrationViewResponse> {
    Json(RegistrationViewResponse {
        data: RegistrationViewData {
            view: "registroPaciente",
            title: "Registro de Paciente",
            user: None,
            google_email: q.google_email,
            google_first_name: q.google_first_name,
            google_last_name: q.google_last_name,
        },
    })
}
