// src/routes/doctor_routes.rs

use axum::{
    extract::{Path, Query, State},
    routing::{delete, get},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{AppState, DoctorRow, OkData, OkResponse, ROLE_ADMIN},
    routes::appointment_routes::deserialize_double_option,
};

fn ensure_admin(auth: &AuthContext) -> Result<(), ApiError> {
    if auth.role == ROLE_ADMIN {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "FORBIDDEN",
            "Only administrative staff can manage medicos".into(),
        ))
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_doctors).post(create_doctor))
        .route("/{doctor_id}", get(get_doctor).patch(update_doctor))
        .route("/{doctor_id}", delete(delete_doctor))
}

const DOCTOR_COLUMNS: &str =
    "doctor_id, user_id, first_name, last_name, specialty, license_number, email, created_at";

/// Full collection in insertion order, for the dashboard's medicos list.
pub async fn fetch_all_doctors(state: &AppState) -> Result<Vec<DoctorRow>, ApiError> {
    let rows: Vec<DoctorRow> = sqlx::query_as::<_, DoctorRow>(&format!(
        r#"
        SELECT {DOCTOR_COLUMNS}
        FROM doctor
        ORDER BY created_at ASC
        "#
    ))
    .fetch_all(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;
    Ok(rows)
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
}

pub async fn list_doctors(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(q): Query<SearchQuery>,
) -> Result<Json<Vec<DoctorRow>>, ApiError> {
    let query = q.query.unwrap_or_default().trim().to_string();
    if query.is_empty() {
        let rows = fetch_all_doctors(&state).await?;
        return Ok(Json(rows));
    }

    let like = format!("%{}%", query);
    let rows: Vec<DoctorRow> = sqlx::query_as::<_, DoctorRow>(&format!(
        r#"
        SELECT {DOCTOR_COLUMNS}
        FROM doctor
        WHERE first_name ILIKE $1
           OR last_name ILIKE $1
           OR specialty ILIKE $1
        ORDER BY created_at ASC
        "#
    ))
    .bind(like)
    .fetch_all(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    Ok(Json(rows))
}

pub async fn get_doctor(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<DoctorRow>, ApiError> {
    let row: DoctorRow = sqlx::query_as::<_, DoctorRow>(&format!(
        r#"
        SELECT {DOCTOR_COLUMNS}
        FROM doctor
        WHERE doctor_id = $1
        "#
    ))
    .bind(doctor_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?
    .ok_or_else(|| ApiError::NotFound("NOT_FOUND", "doctor not found".into()))?;

    Ok(Json(row))
}

#[derive(Debug, Deserialize)]
pub struct CreateDoctorRequest {
    pub first_name: String,
    pub last_name: String,
    pub specialty: String,
    pub license_number: Option<String>,
    pub email: Option<String>,
}

pub async fn create_doctor(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateDoctorRequest>,
) -> Result<Json<DoctorRow>, ApiError> {
    ensure_admin(&auth)?;

    let first_name = req.first_name.trim();
    let last_name = req.last_name.trim();
    let specialty = req.specialty.trim();

    if first_name.is_empty() || last_name.is_empty() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "first_name and last_name are required".to_string(),
        ));
    }
    if specialty.is_empty() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "specialty is required".to_string(),
        ));
    }

    let row: DoctorRow = sqlx::query_as::<_, DoctorRow>(&format!(
        r#"
        INSERT INTO doctor (first_name, last_name, specialty, license_number, email, created_at)
        VALUES ($1, $2, $3, $4, $5, now())
        RETURNING {DOCTOR_COLUMNS}
        "#
    ))
    .bind(first_name)
    .bind(last_name)
    .bind(specialty)
    .bind(req.license_number.as_deref().map(str::trim))
    .bind(req.email.as_deref().map(str::trim))
    .fetch_one(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    Ok(Json(row))
}

#[derive(Debug, Deserialize)]
pub struct UpdateDoctorRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub specialty: Option<String>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub license_number: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub email: Option<Option<String>>,
}

pub async fn update_doctor(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(doctor_id): Path<Uuid>,
    Json(req): Json<UpdateDoctorRequest>,
) -> Result<Json<DoctorRow>, ApiError> {
    ensure_admin(&auth)?;

    let existing: DoctorRow = sqlx::query_as::<_, DoctorRow>(&format!(
        r#"
        SELECT {DOCTOR_COLUMNS}
        FROM doctor
        WHERE doctor_id = $1
        "#
    ))
    .bind(doctor_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?
    .ok_or_else(|| ApiError::NotFound("NOT_FOUND", "doctor not found".to_string()))?;

    let first_name = match req.first_name.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => existing.first_name.clone(),
    };
    let last_name = match req.last_name.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => existing.last_name.clone(),
    };
    let specialty = match req.specialty.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => existing.specialty.clone(),
    };

    let license_number: Option<String> = match req.license_number {
        None => existing.license_number.clone(),
        Some(None) => None,
        Some(Some(l)) => {
            let t = l.trim();
            if t.is_empty() { None } else { Some(t.to_string()) }
        }
    };

    let email: Option<String> = match req.email {
        None => existing.email.clone(),
        Some(None) => None,
        Some(Some(e)) => {
            let t = e.trim();
            if t.is_empty() { None } else { Some(t.to_string()) }
        }
    };

    let updated: DoctorRow = sqlx::query_as::<_, DoctorRow>(&format!(
        r#"
        UPDATE doctor
        SET first_name = $1,
            last_name = $2,
            specialty = $3,
            license_number = $4,
            email = $5
        WHERE doctor_id = $6
        RETURNING {DOCTOR_COLUMNS}
        "#
    ))
    .bind(first_name)
    .bind(last_name)
    .bind(specialty)
    .bind(license_number)
    .bind(email)
    .bind(doctor_id)
    .fetch_one(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    Ok(Json(updated))
}

pub async fn delete_doctor(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<OkResponse>, ApiError> {
    ensure_admin(&auth)?;

    let res = sqlx::query(
        r#"
        DELETE FROM doctor
        WHERE doctor_id = $1
        "#,
    )
    .bind(doctor_id)
    .execute(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    if res.rows_affected() == 0 {
        return Err(ApiError::NotFound("NOT_FOUND", "doctor not found".into()));
    }

    Ok(Json(OkResponse {
        data: OkData { ok: true },
    }))
}
