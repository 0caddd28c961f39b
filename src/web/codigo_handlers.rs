// src/web/codigo_handlers.rs
use crate::{
    error::AppResult,
    models::codigo::{ActualizarCodigo, CodigoFacturacion, NuevoCodigo},
    response::{ApiResponse, Creado},
    services::codigo_service,
    state::AppState,
    web::extract::{Consulta, Cuerpo, Ruta},
};
use axum::{
    extract::State,
    Json,
};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct FiltroCodigos {
    #[serde(default)]
    pub activos: bool,
}

pub async fn listar(
    State(state): State<AppState>,
    Consulta(filtro): Consulta<FiltroCodigos>,
) -> AppResult<Json<ApiResponse<Vec<CodigoFacturacion>>>> {
    let codigos = codigo_service::listar(&state.db_pool, filtro.activos).await?;
    Ok(Json(ApiResponse::ok(codigos)))
}

pub async fn crear(
    State(state): State<AppState>,
    Cuerpo(nuevo): Cuerpo<NuevoCodigo>,
) -> AppResult<Creado<CodigoFacturacion>> {
    let codigo = codigo_service::crear(&state.db_pool, nuevo).await?;
    Ok(Creado(codigo))
}

pub async fn actualizar(
    State(state): State<AppState>,
    Ruta(id): Ruta<i64>,
    Cuerpo(cambios): Cuerpo<ActualizarCodigo>,
) -> AppResult<Json<ApiResponse<CodigoFacturacion>>> {
    let codigo = codigo_service::actualizar(&state.db_pool, id, cambios).await?;
    Ok(Json(ApiResponse::ok(codigo)))
}

pub async fn desactivar(
    State(state): State<AppState>,
    Ruta(id): Ruta<i64>,
) -> AppResult<Json<ApiResponse<CodigoFacturacion>>> {
    let codigo = codigo_service::desactivar(&state.db_pool, id).await?;
    Ok(Json(ApiResponse::ok_with_message(codigo, "Código desactivado")))
}

pub async fn eliminar(State(state): State<AppState>, Ruta(id): Ruta<i64>) -> AppResult<Json<ApiResponse<()>>> {
    codigo_service::eliminar(&state.db_pool, id).await?;
    Ok(Json(ApiResponse::ok_with_message((), "Código eliminado")))
}
