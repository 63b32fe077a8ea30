use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub session_ttl_hours: i64,
    pub dashboard_recent_limit: usize,
}

/* -------------------------
   Roles
--------------------------*/

// app_user.role (smallint)
pub const ROLE_PATIENT: i16 = 0;
pub const ROLE_ADMIN: i16 = 1;
pub const ROLE_DOCTOR: i16 = 2;

/// Display labels as the frontend expects them.
pub fn role_to_string(role: i16) -> String {
    match role {
        ROLE_PATIENT => "Paciente",
        ROLE_ADMIN => "Administrativo",
        ROLE_DOCTOR => "Medico",
        _ => "unknown",
    }
    .to_string()
}

/* -------------------------
   API DTOs
--------------------------*/

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    pub device_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub data: LoginResponseData,
}

#[derive(Debug, Serialize)]
pub struct LoginResponseData {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserProfile,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub data: MeResponseData,
}

#[derive(Debug, Serialize)]
pub struct MeResponseData {
    pub user: UserProfile,
    pub session: SessionInfo,
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub data: OkData,
}

#[derive(Debug, Serialize)]
pub struct OkData {
    pub ok: bool,
}

#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub username: String,
    pub display_name: String,
    pub role: String,
    pub doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub session_token_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/* -------------------------
   DB Row Models
--------------------------*/

#[derive(Debug, sqlx::FromRow)]
pub struct UserRow {
    pub user_id: Uuid,
    pub username: String,
    pub display_name: String,
    pub password_hash: String,
    pub role: i16,
    pub is_active: bool,
}

/// A user joined with their optional doctor/patient links, the raw material
/// for a [`UserProfile`] and for an explicit viewer identity.
#[derive(Debug, sqlx::FromRow)]
pub struct UserLinksRow {
    pub user_id: Uuid,
    pub username: String,
    pub display_name: String,
    pub role: i16,
    pub is_active: bool,
    pub doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
}

impl UserLinksRow {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            user_id: self.user_id,
            username: self.username.clone(),
            display_name: self.display_name.clone(),
            role: role_to_string(self.role),
            doctor_id: self.doctor_id,
            patient_id: self.patient_id,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct SessionTokenRow {
    pub session_token_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PatientRow {
    pub patient_id: Uuid,
    pub user_id: Option<Uuid>,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub birthday: Option<chrono::NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DoctorRow {
    pub doctor_id: Uuid,
    pub user_id: Option<Uuid>,
    pub first_name: String,
    pub last_name: String,
    pub specialty: String,
    pub license_number: Option<String>,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

/* -------------------------
   Appointments (turnos)
--------------------------*/

// appointment.status (smallint)
pub const APPOINTMENT_STATUS_SCHEDULED: i16 = 0;
pub const APPOINTMENT_STATUS_COMPLETED: i16 = 1;
pub const APPOINTMENT_STATUS_CANCELLED: i16 = 2;

/// One turno joined with its patient/doctor display fields, as handed to the
/// dashboards. `date` carries the calendar day as a stored instant;
/// `start_time` is the clinic-local "HH:MM" wall clock, kept as text so a
/// malformed value degrades per record instead of failing the whole fetch.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AppointmentRecord {
    pub appointment_id: Uuid,
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub date: Option<DateTime<Utc>>,
    pub start_time: Option<String>,
    pub reason: Option<String>,
    pub status: i16,
    pub created_at: DateTime<Utc>,
    pub patient_name: Option<String>,
    pub doctor_name: Option<String>,
    pub specialty: Option<String>,
}

/// An [`AppointmentRecord`] annotated with its derived display date. The
/// record's own fields are flattened into the payload unchanged.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectedAppointment {
    #[serde(flatten)]
    pub record: AppointmentRecord,
    pub display_date: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_labels_match_frontend() {
        assert_eq!(role_to_string(ROLE_PATIENT), "Paciente");
        assert_eq!(role_to_string(ROLE_ADMIN), "Administrativo");
        assert_eq!(role_to_string(ROLE_DOCTOR), "Medico");
        assert_eq!(role_to_string(9), "unknown");
    }
}
