// src/web/mw_auth.rs
use crate::error::AppError;
use axum::{extract::Request, middleware::Next, response::Response};
use tower_sessions::Session;

pub const SESSION_USER_KEY: &str = "user_id";

// Exige sesión iniciada; deja el id del usuario en las extensiones
pub async fn require_auth(session: Session, mut request: Request, next: Next) -> Result<Response, AppError> {
    match session.get::<String>(SESSION_USER_KEY).await {
        Ok(Some(user_id)) => {
            tracing::debug!("Auth MW: usuario '{}' autenticado", user_id);
            request.extensions_mut().insert(UserId(user_id));
            Ok(next.run(request).await)
        }
        Ok(None) => {
            tracing::debug!("Auth MW: petición sin sesión a {}", request.uri().path());
            Err(AppError::Unauthorized)
        }
        Err(e) => {
            tracing::error!("Auth MW: error al leer la sesión: {:?}", e);
            Err(AppError::SessionError(format!("Error al verificar la sesión: {}", e)))
        }
    }
}

#[derive(Clone, Debug)]
pub struct UserId(pub String);
