// src/routes/user_routes.rs

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::hash_password,
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{AppState, ROLE_ADMIN, ROLE_DOCTOR, ROLE_PATIENT},
};

fn ensure_admin(auth: &AuthContext) -> Result<(), ApiError> {
    if auth.role == ROLE_ADMIN {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "FORBIDDEN",
            "Only administrative staff can manage users".into(),
        ))
    }
}

fn validate_role(role: i16) -> Result<(), ApiError> {
    if matches!(role, ROLE_PATIENT | ROLE_ADMIN | ROLE_DOCTOR) {
        Ok(())
    } else {
        Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "role must be 0 (Paciente), 1 (Administrativo) or 2 (Medico)".into(),
        ))
    }
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct UserPublicRow {
    pub user_id: Uuid,
    pub username: String,
    pub display_name: String,
    pub role: i16,
    pub is_active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct UsersListResponse {
    pub data: UsersListData,
}

#[derive(Debug, Serialize)]
pub struct UsersListData {
    pub users: Vec<UserPublicRow>,
}

#[derive(Debug, Serialize)]
pub struct UserGetResponse {
    pub data: UserPublicRow,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/{user_id}", get(get_user).patch(update_user))
        .route("/{user_id}/link_doctor/{doctor_id}", post(link_doctor))
        .route("/{user_id}/link_patient/{patient_id}", post(link_patient))
}

pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<UsersListResponse>, ApiError> {
    ensure_admin(&auth)?;

    let users: Vec<UserPublicRow> = sqlx::query_as::<_, UserPublicRow>(
        r#"
        SELECT user_id, username, display_name, role, is_active, created_at
        FROM app_user
        ORDER BY created_at ASC
        "#,
    )
    .fetch_all(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    Ok(Json(UsersListResponse {
        data: UsersListData { users },
    }))
}

pub async fn get_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserGetResponse>, ApiError> {
    ensure_admin(&auth)?;

    let user: UserPublicRow = sqlx::query_as::<_, UserPublicRow>(
        r#"
        SELECT user_id, username, display_name, role, is_active, created_at
        FROM app_user
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?
    .ok_or_else(|| ApiError::NotFound("NOT_FOUND", "user not found".into()))?;

    Ok(Json(UserGetResponse { data: user }))
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub display_name: String,
    pub password: String,
    pub role: i16,               // 0..2
    pub is_active: Option<bool>, // default true
}

pub async fn create_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateUserRequest>,
) -> Result<Json<UserGetResponse>, ApiError> {
    ensure_admin(&auth)?;

    let username = req.username.trim();
    let display_name = req.display_name.trim();

    if username.is_empty() || display_name.is_empty() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "username and display_name are required".into(),
        ));
    }
    if req.password.trim().len() < 8 {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "password must be at least 8 characters".into(),
        ));
    }
    validate_role(req.role)?;

    let password_hash = hash_password(&req.password).map_err(ApiError::Internal)?;

    let user: UserPublicRow = sqlx::query_as::<_, UserPublicRow>(
        r#"
        INSERT INTO app_user (username, display_name, password_hash, role, is_active)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING user_id, username, display_name, role, is_active, created_at
        "#,
    )
    .bind(username)
    .bind(display_name)
    .bind(&password_hash)
    .bind(req.role)
    .bind(req.is_active.unwrap_or(true))
    .fetch_one(&state.db)
    .await
    .map_err(|e| ApiError::BadRequest("USER_CREATE_FAILED", format!("{e}")))?;

    Ok(Json(UserGetResponse { data: user }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub display_name: Option<String>,
    pub role: Option<i16>,
    pub is_active: Option<bool>,
}

pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<UserGetResponse>, ApiError> {
    ensure_admin(&auth)?;

    if let Some(role) = req.role {
        validate_role(role)?;
    }
    if let Some(name) = req.display_name.as_deref() {
        if name.trim().is_empty() {
            return Err(ApiError::BadRequest(
                "VALIDATION_ERROR",
                "display_name must not be empty".into(),
            ));
        }
    }

    // Admins cannot demote or disable themselves; keeps at least this
    // session's admin alive.
    if user_id == auth.user_id
        && (req.role.is_some_and(|r| r != ROLE_ADMIN) || req.is_active == Some(false))
    {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "cannot demote or disable your own account".into(),
        ));
    }

    let user: UserPublicRow = sqlx::query_as::<_, UserPublicRow>(
        r#"
        UPDATE app_user
        SET display_name = COALESCE($2, display_name),
            role = COALESCE($3, role),
            is_active = COALESCE($4, is_active)
        WHERE user_id = $1
        RETURNING user_id, username, display_name, role, is_active, created_at
        "#,
    )
    .bind(user_id)
    .bind(req.display_name.as_deref().map(str::trim))
    .bind(req.role)
    .bind(req.is_active)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?
    .ok_or_else(|| ApiError::NotFound("NOT_FOUND", "user not found".into()))?;

    Ok(Json(UserGetResponse { data: user }))
}

/// Attach a doctor record to a user account so their dashboard can scope to
/// their own turnos.
pub async fn link_doctor(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((user_id, doctor_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<UserGetResponse>, ApiError> {
    ensure_admin(&auth)?;

    let res = sqlx::query(
        r#"
        UPDATE doctor
        SET user_id = $1
        WHERE doctor_id = $2
        "#,
    )
    .bind(user_id)
    .bind(doctor_id)
    .execute(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    if res.rows_affected() == 0 {
        return Err(ApiError::NotFound("NOT_FOUND", "doctor not found".into()));
    }

    get_user(State(state), auth, Path(user_id)).await
}

pub async fn link_patient(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((user_id, patient_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<UserGetResponse>, ApiError> {
    ensure_admin(&auth)?;

    let res = sqlx::query(
        r#"
        UPDATE patient
        SET user_id = $1
        WHERE patient_id = $2
        "#,
    )
    .bind(user_id)
    .bind(patient_id)
    .execute(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    if res.rows_affected() == 0 {
        return Err(ApiError::NotFound("NOT_FOUND", "patient not found".into()));
    }

    get_user(State(state), auth, Path(user_id)).await
}
