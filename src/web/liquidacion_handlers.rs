// src/web/liquidacion_handlers.rs
use crate::{
    error::AppResult,
    models::liquidacion::{
        CambioEstadoLiquidacion, FiltrosLiquidaciones, GenerarLiquidacion, Liquidacion, LiquidacionCompleta,
    },
    response::{ApiResponse, Creado},
    services::liquidacion_service,
    state::AppState,
    web::extract::{Consulta, Cuerpo, Ruta},
};
use axum::{
    extract::State,
    Json,
};

pub async fn generar(
    State(state): State<AppState>,
    Cuerpo(peticion): Cuerpo<GenerarLiquidacion>,
) -> AppResult<Creado<LiquidacionCompleta>> {
    let liquidacion = liquidacion_service::generar(&state.db_pool, peticion).await?;
    Ok(Creado(liquidacion))
}

pub async fn listar(
    State(state): State<AppState>,
    Consulta(filtros): Consulta<FiltrosLiquidaciones>,
) -> AppResult<Json<ApiResponse<Vec<Liquidacion>>>> {
    let liquidaciones = liquidacion_service::listar(&state.db_pool, &filtros).await?;
    Ok(Json(ApiResponse::ok(liquidaciones)))
}

pub async fn obtener(
    State(state): State<AppState>,
    Ruta(id): Ruta<String>,
) -> AppResult<Json<ApiResponse<LiquidacionCompleta>>> {
    let liquidacion = liquidacion_service::obtener(&state.db_pool, &id).await?;
    Ok(Json(ApiResponse::ok(liquidacion)))
}

pub async fn cambiar_estado(
    State(state): State<AppState>,
    Ruta(id): Ruta<String>,
    Cuerpo(cambio): Cuerpo<CambioEstadoLiquidacion>,
) -> AppResult<Json<ApiResponse<LiquidacionCompleta>>> {
    let liquidacion = liquidacion_service::cambiar_estado(&state.db_pool, &id, cambio.nuevo_estado).await?;
    Ok(Json(ApiResponse::ok(liquidacion)))
}

pub async fn anular(
    State(state): State<AppState>,
    Ruta(id): Ruta<String>,
) -> AppResult<Json<ApiResponse<LiquidacionCompleta>>> {
    let liquidacion = liquidacion_service::anular(&state.db_pool, &id).await?;
    Ok(Json(ApiResponse::ok_with_message(liquidacion, "Liquidación anulada")))
}
