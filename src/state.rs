// src/state.rs
use crate::services::calendario::CalendarioFeriados;
use sqlx::SqlitePool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: SqlitePool,
    // Fuente de feriados para clasificar guardias
    pub calendario: Arc<dyn CalendarioFeriados>,
}

// Permite extraer el pool directamente
impl axum::extract::FromRef<AppState> for SqlitePool {
    fn from_ref(state: &AppState) -> SqlitePool {
        state.db_pool.clone()
    }
}

impl axum::extract::FromRef<AppState> for Arc<dyn CalendarioFeriados> {
    fn from_ref(state: &AppState) -> Arc<dyn CalendarioFeriados> {
        state.calendario.clone()
    }
}
