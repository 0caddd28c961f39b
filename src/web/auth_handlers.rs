// src/web/auth_handlers.rs
use crate::{
    error::{AppError, AppResult},
    models::user::{LoginForm, UsuarioActual},
    response::ApiResponse,
    services::{auth_service, user_service},
    state::AppState,
    web::{
        extract::Cuerpo,
        mw_auth::{UserId, SESSION_USER_KEY},
    },
};
use axum::{
    extract::{Extension, State},
    Json,
};
use tower_sessions::Session;

// POST /login
pub async fn handle_login(
    State(state): State<AppState>,
    session: Session,
    Cuerpo(form): Cuerpo<LoginForm>,
) -> AppResult<Json<ApiResponse<UsuarioActual>>> {
    tracing::info!("Intento de login para '{}'", form.id);
    let user = auth_service::autenticar(&state.db_pool, &form).await?;

    // Nuevo id de sesión tras autenticar
    session
        .cycle_id()
        .await
        .map_err(|e| AppError::SessionError(format!("No se pudo rotar el id: {}", e)))?;
    session
        .insert(SESSION_USER_KEY, &user.id)
        .await
        .map_err(|e| AppError::SessionError(format!("No se pudo guardar la sesión: {}", e)))?;

    let actual = user_service::usuario_actual(&state.db_pool, &user.id).await?;
    tracing::info!("✅ Login correcto: {}", user.id);
    Ok(Json(ApiResponse::ok_with_message(actual, "Sesión iniciada")))
}

// POST /logout
pub async fn handle_logout(session: Session) -> AppResult<Json<ApiResponse<()>>> {
    let user_id: Option<String> = session.get(SESSION_USER_KEY).await.ok().flatten();
    session
        .delete()
        .await
        .map_err(|e| AppError::SessionError(format!("No se pudo borrar la sesión: {}", e)))?;

    match user_id {
        Some(id) => tracing::info!("🚪 Usuario '{}' desconectado.", id),
        None => tracing::info!("🚪 Sesión anónima cerrada."),
    }
    Ok(Json(ApiResponse::ok_with_message((), "Sesión cerrada")))
}

// GET /api/me
pub async fn handle_me(
    State(state): State<AppState>,
    Extension(UserId(user_id)): Extension<UserId>,
) -> AppResult<Json<ApiResponse<UsuarioActual>>> {
    let actual = user_service::usuario_actual(&state.db_pool, &user_id).await?;
    Ok(Json(ApiResponse::ok(actual)))
}
