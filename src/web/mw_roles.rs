// src/web/mw_roles.rs
use crate::{
    error::AppError,
    models::user::Capacidad,
    services::user_service,
    state::AppState,
    web::mw_auth::UserId,
};
use axum::{
    extract::{Extension, Request, State},
    middleware::Next,
    response::Response,
};

/// Va *después* de `require_auth`, que deja el `UserId`.
async fn exigir(
    state: &AppState,
    user_id: &str,
    capacidad: Capacidad,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if user_service::tiene_capacidad(&state.db_pool, user_id, capacidad).await? {
        Ok(next.run(request).await)
    } else {
        tracing::warn!(
            "Acceso denegado a {} {} para '{}' (requiere {:?})",
            request.method(),
            request.uri().path(),
            user_id,
            capacidad
        );
        Err(AppError::Forbidden)
    }
}

/// Base de todo `/api`: un usuario sin roles reconocidos no entra.
pub async fn require_registrar(
    State(state): State<AppState>,
    Extension(UserId(user_id)): Extension<UserId>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    exigir(&state, &user_id, Capacidad::Registrar, request, next).await
}

pub async fn require_revisar(
    State(state): State<AppState>,
    Extension(UserId(user_id)): Extension<UserId>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    exigir(&state, &user_id, Capacidad::Revisar, request, next).await
}

pub async fn require_admin(
    State(state): State<AppState>,
    Extension(UserId(user_id)): Extension<UserId>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    exigir(&state, &user_id, Capacidad::Administrar, request, next).await
}
