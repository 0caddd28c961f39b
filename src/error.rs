// src/error.rs
use crate::response::ApiResponse;
use axum::{http::StatusCode, response::IntoResponse, Json};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    // --- Errores de dominio ---
    #[error("Dato inválido en '{campo}': {motivo}")]
    Validation { campo: String, motivo: String },

    #[error("{entidad} '{id}' no encontrado")]
    NotFound { entidad: &'static str, id: String },

    #[error("Transición inválida de '{desde}' a '{hacia}'")]
    InvalidTransition { desde: String, hacia: String },

    #[error("Ya existe una guardia para '{usuario}' el {fecha}")]
    DuplicateShift { usuario: String, fecha: String },

    #[error("El periodo {0} ya tiene una liquidación vigente")]
    PeriodAlreadySettled(String),

    #[error("Conflicto de concurrencia: {0}")]
    ConcurrencyConflict(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Fallo en colaborador externo: {0}")]
    Upstream(String),

    // --- Errores de infraestructura ---
    #[error("Error en la base de datos: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Error de migración de la base de datos: {0}")]
    SqlxMigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("Variable de entorno: {0}")]
    EnvVarError(#[from] std::env::VarError),

    #[error("Error al procesar password")]
    PasswordHashingError,

    #[error("Credenciales inválidas")]
    InvalidCredentials,

    #[error("Error en la sesión: {0}")]
    SessionError(String),

    #[error("Error interno inesperado")]
    InternalServerError,

    #[error("No autenticado")]
    Unauthorized,

    #[error("Acceso denegado")]
    Forbidden,
}

impl AppError {
    pub fn validation(campo: impl Into<String>, motivo: impl Into<String>) -> Self {
        AppError::Validation {
            campo: campo.into(),
            motivo: motivo.into(),
        }
    }

    pub fn not_found(entidad: &'static str, id: impl ToString) -> Self {
        AppError::NotFound {
            entidad,
            id: id.to_string(),
        }
    }

    pub fn transition(desde: impl ToString, hacia: impl ToString) -> Self {
        AppError::InvalidTransition {
            desde: desde.to_string(),
            hacia: hacia.to_string(),
        }
    }

    /// Clasifica el error de SQLite: bloqueos pasan a conflicto de concurrencia.
    pub fn from_db(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            // SQLITE_BUSY (5) y SQLITE_LOCKED (6), con sus códigos extendidos
            if matches!(db_err.code().as_deref(), Some("5" | "6" | "261" | "262" | "517")) {
                return AppError::ConcurrencyConflict(db_err.message().to_string());
            }
        }
        AppError::SqlxError(err)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::DuplicateShift { .. }
            | AppError::PeriodAlreadySettled(_)
            | AppError::ConcurrencyConflict(_)
            | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::InvalidTransition { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::InvalidCredentials | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Código estable para clientes.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "ValidationError",
            AppError::NotFound { .. } => "NotFoundError",
            AppError::InvalidTransition { .. } => "InvalidTransitionError",
            AppError::DuplicateShift { .. } => "DuplicateShiftError",
            AppError::PeriodAlreadySettled(_) => "PeriodAlreadySettledError",
            AppError::ConcurrencyConflict(_) => "ConcurrencyConflictError",
            AppError::Conflict(_) => "ConflictError",
            AppError::Upstream(_) => "UpstreamError",
            AppError::InvalidCredentials | AppError::Unauthorized => "Unauthorized",
            AppError::Forbidden => "Forbidden",
            _ => "InternalError",
        }
    }

    fn es_interno(&self) -> bool {
        self.status() == StatusCode::INTERNAL_SERVER_ERROR
            || matches!(self, AppError::Upstream(_))
    }
}

// Conversión de AppError en respuesta HTTP
impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();

        // Los fallos internos se registran con detalle y se devuelven genéricos
        let mensaje = if self.es_interno() {
            tracing::error!("Error procesado: {:?}", self);
            if matches!(self, AppError::Upstream(_)) {
                "Un servicio externo no respondió correctamente.".to_string()
            } else {
                "Ocurrió un error inesperado.".to_string()
            }
        } else {
            tracing::debug!("Error de cliente ({}): {}", status, self);
            self.to_string()
        };

        let body: ApiResponse<()> = ApiResponse::error(self.code(), mensaje);
        (status, Json(body)).into_response()
    }
}

// Tipo Result estándar de la aplicación
pub type AppResult<T = ()> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn clases_de_error_mapean_a_su_status() {
        assert_eq!(AppError::validation("minutos", "debe ser positivo").status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::not_found("Guardia", "x").status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::PeriodAlreadySettled("2025-03".into()).status(), StatusCode::CONFLICT);
        assert_eq!(AppError::transition("cerrada", "pendiente").status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(AppError::Upstream("calendario".into()).status(), StatusCode::BAD_GATEWAY);
        assert_eq!(AppError::InternalServerError.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn errores_internos_no_filtran_detalle() {
        let resp = AppError::SqlxError(sqlx::Error::PoolTimedOut).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "InternalError");
        assert!(!json["message"].as_str().unwrap().contains("pool"));
    }

    #[tokio::test]
    async fn errores_de_validacion_incluyen_el_campo() {
        let resp = AppError::validation("fecha", "formato YYYY-MM-DD").into_response();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["error"], "ValidationError");
        assert!(json["message"].as_str().unwrap().contains("fecha"));
    }
}
