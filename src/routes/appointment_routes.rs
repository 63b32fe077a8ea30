// src/routes/appointment_routes.rs

use axum::{
    extract::{Path, State},
    routing::{delete, get, patch},
    Json, Router,
};
use chrono::{DateTime, NaiveTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{
        AppState, AppointmentRecord, OkData, OkResponse, ROLE_ADMIN,
        APPOINTMENT_STATUS_CANCELLED, APPOINTMENT_STATUS_COMPLETED, APPOINTMENT_STATUS_SCHEDULED,
    },
};

fn ensure_admin(auth: &AuthContext) -> Result<(), ApiError> {
    if auth.role == ROLE_ADMIN {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "FORBIDDEN",
            "Only administrative staff can manage turnos".into(),
        ))
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_appointments).post(create_appointment))
        .route("/{appointment_id}", get(get_appointment))
        .route("/{appointment_id}", patch(update_appointment))
        .route("/{appointment_id}", delete(delete_appointment))
}

const APPOINTMENT_SELECT: &str = r#"
    SELECT
      a.appointment_id,
      a.patient_id,
      a.doctor_id,
      a.date,
      a.start_time,
      a.reason,
      a.status,
      a.created_at,
      p.first_name || ' ' || p.last_name AS patient_name,
      d.first_name || ' ' || d.last_name AS doctor_name,
      d.specialty AS specialty
    FROM appointment a
    LEFT JOIN patient p ON p.patient_id = a.patient_id
    LEFT JOIN doctor d ON d.doctor_id = a.doctor_id
"#;

/// Every turno joined with its patient/doctor display fields, in insertion
/// order. The dashboards project this set in memory; a fetch failure
/// surfaces as an error here, never as an empty list.
pub async fn fetch_appointments_with_names(
    state: &AppState,
) -> Result<Vec<AppointmentRecord>, ApiError> {
    let sql = format!("{APPOINTMENT_SELECT} ORDER BY a.created_at ASC");
    let rows: Vec<AppointmentRecord> = sqlx::query_as::<_, AppointmentRecord>(&sql)
        .fetch_all(&state.db)
        .await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;
    Ok(rows)
}

pub async fn list_appointments(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> Result<Json<Vec<AppointmentRecord>>, ApiError> {
    let rows = fetch_appointments_with_names(&state).await?;
    Ok(Json(rows))
}

pub async fn get_appointment(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<AppointmentRecord>, ApiError> {
    let sql = format!("{APPOINTMENT_SELECT} WHERE a.appointment_id = $1");
    let row: AppointmentRecord = sqlx::query_as::<_, AppointmentRecord>(&sql)
        .bind(appointment_id)
        .fetch_optional(&state.db)
        .await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?
        .ok_or_else(|| ApiError::NotFound("NOT_FOUND", "turno not found".into()))?;

    Ok(Json(row))
}

/// Write-side guard: stored times must be wall-clock "HH:MM" (or "HH:MM:SS").
/// Reads stay tolerant of whatever is already stored.
fn validate_start_time(raw: &str) -> Result<(), ApiError> {
    let raw = raw.trim();
    let ok = NaiveTime::parse_from_str(raw, "%H:%M").is_ok()
        || NaiveTime::parse_from_str(raw, "%H:%M:%S").is_ok();
    if ok {
        Ok(())
    } else {
        Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "start_time must be HH:MM".into(),
        ))
    }
}

fn validate_status(status: i16) -> Result<(), ApiError> {
    if matches!(
        status,
        APPOINTMENT_STATUS_SCHEDULED | APPOINTMENT_STATUS_COMPLETED | APPOINTMENT_STATUS_CANCELLED
    ) {
        Ok(())
    } else {
        Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "status must be 0..2".into(),
        ))
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub date: Option<DateTime<Utc>>,
    pub start_time: Option<String>,
    pub reason: Option<String>,
}

pub async fn create_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateAppointmentRequest>,
) -> Result<Json<AppointmentRecord>, ApiError> {
    ensure_admin(&auth)?;

    if let Some(st) = req.start_time.as_deref() {
        validate_start_time(st)?;
    }

    // Ensure the patient exists up front for a clearer error than an FK hit
    let patient_exists: Option<Uuid> = sqlx::query_scalar(
        r#"
        SELECT patient_id
        FROM patient
        WHERE patient_id = $1
        "#,
    )
    .bind(req.patient_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    if patient_exists.is_none() {
        return Err(ApiError::BadRequest(
            "NOT_FOUND",
            "patient not found".into(),
        ));
    }

    if let Some(doctor_id) = req.doctor_id {
        let doctor_exists: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT doctor_id
            FROM doctor
            WHERE doctor_id = $1
            "#,
        )
        .bind(doctor_id)
        .fetch_optional(&state.db)
        .await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

        if doctor_exists.is_none() {
            return Err(ApiError::BadRequest(
                "NOT_FOUND",
                "doctor not found".into(),
            ));
        }
    }

    let row: (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO appointment (patient_id, doctor_id, date, start_time, reason, status, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, now())
        RETURNING appointment_id
        "#,
    )
    .bind(req.patient_id)
    .bind(req.doctor_id)
    .bind(req.date)
    .bind(req.start_time.as_deref().map(str::trim))
    .bind(req.reason.as_deref().map(str::trim))
    .bind(APPOINTMENT_STATUS_SCHEDULED)
    .fetch_one(&state.db)
    .await
    .map_err(|e| ApiError::BadRequest("APPOINTMENT_CREATE_FAILED", format!("{e}")))?;

    get_appointment(State(state), auth, Path(row.0)).await
}

use serde::de::Deserializer;

pub(crate) fn deserialize_double_option<'de, D, T>(
    deserializer: D,
) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::Deserialize<'de>,
{
    // Called only when the field is present (even as `null`):
    // null => Some(None) (clear), value => Some(Some(value)).
    let inner = Option::<T>::deserialize(deserializer)?;
    Ok(Some(inner))
}

#[derive(Debug, Deserialize)]
pub struct UpdateAppointmentRequest {
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub doctor_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub date: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub start_time: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub reason: Option<Option<String>>,
    pub status: Option<i16>,
}

pub async fn update_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
    Json(req): Json<UpdateAppointmentRequest>,
) -> Result<Json<AppointmentRecord>, ApiError> {
    ensure_admin(&auth)?;

    #[derive(sqlx::FromRow)]
    struct ExistingAppointment {
        doctor_id: Option<Uuid>,
        date: Option<DateTime<Utc>>,
        start_time: Option<String>,
        reason: Option<String>,
        status: i16,
    }

    let existing: ExistingAppointment = sqlx::query_as(
        r#"
        SELECT doctor_id, date, start_time, reason, status
        FROM appointment
        WHERE appointment_id = $1
        "#,
    )
    .bind(appointment_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?
    .ok_or_else(|| ApiError::NotFound("NOT_FOUND", "turno not found".into()))?;

    let doctor_id = match req.doctor_id {
        None => existing.doctor_id,
        Some(v) => v,
    };
    let date = match req.date {
        None => existing.date,
        Some(v) => v,
    };
    let start_time = match req.start_time {
        None => existing.start_time,
        Some(None) => None,
        Some(Some(st)) => {
            validate_start_time(&st)?;
            Some(st.trim().to_string())
        }
    };
    let reason = match req.reason {
        None => existing.reason,
        Some(v) => v.map(|r| r.trim().to_string()),
    };
    let status = match req.status {
        None => existing.status,
        Some(s) => {
            validate_status(s)?;
            s
        }
    };

    sqlx::query(
        r#"
        UPDATE appointment
        SET doctor_id = $1,
            date = $2,
            start_time = $3,
            reason = $4,
            status = $5
        WHERE appointment_id = $6
        "#,
    )
    .bind(doctor_id)
    .bind(date)
    .bind(start_time)
    .bind(reason)
    .bind(status)
    .bind(appointment_id)
    .execute(&state.db)
    .await
    .map_err(|e| ApiError::BadRequest("APPOINTMENT_UPDATE_FAILED", format!("{e}")))?;

    get_appointment(State(state), auth, Path(appointment_id)).await
}

pub async fn delete_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<OkResponse>, ApiError> {
    ensure_admin(&auth)?;

    let res = sqlx::query(
        r#"
        DELETE FROM appointment
        WHERE appointment_id = $1
        "#,
    )
    .bind(appointment_id)
    .execute(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    if res.rows_affected() == 0 {
        return Err(ApiError::NotFound("NOT_FOUND", "turno not found".into()));
    }

    Ok(Json(OkResponse {
        data: OkData { ok: true },
    }))
}
