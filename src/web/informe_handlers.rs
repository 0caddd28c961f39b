// src/web/informe_handlers.rs
use crate::{
    error::AppResult,
    models::informe::{FiltrosInforme, InformeGuardias, InformeIncidentes, InformeLiquidaciones, InformeResumen},
    response::ApiResponse,
    services::{
        exportacion::{self, TipoInforme},
        informe_service,
    },
    state::AppState,
    web::extract::{Consulta, Ruta},
};
use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

pub async fn incidentes(
    State(state): State<AppState>,
    Consulta(filtros): Consulta<FiltrosInforme>,
) -> AppResult<Json<ApiResponse<InformeIncidentes>>> {
    let informe = informe_service::informe_incidentes(&state.db_pool, &filtros).await?;
    Ok(Json(ApiResponse::ok(informe)))
}

pub async fn guardias(
    State(state): State<AppState>,
    Consulta(filtros): Consulta<FiltrosInforme>,
) -> AppResult<Json<ApiResponse<InformeGuardias>>> {
    let informe = informe_service::informe_guardias(&state.db_pool, &filtros).await?;
    Ok(Json(ApiResponse::ok(informe)))
}

pub async fn liquidaciones(
    State(state): State<AppState>,
    Consulta(filtros): Consulta<FiltrosInforme>,
) -> AppResult<Json<ApiResponse<InformeLiquidaciones>>> {
    let informe = informe_service::informe_liquidaciones(&state.db_pool, &filtros).await?;
    Ok(Json(ApiResponse::ok(informe)))
}

pub async fn resumen(
    State(state): State<AppState>,
    Consulta(filtros): Consulta<FiltrosInforme>,
) -> AppResult<Json<ApiResponse<InformeResumen>>> {
    let informe = informe_service::informe_resumen(&state.db_pool, &filtros).await?;
    Ok(Json(ApiResponse::ok(informe)))
}

#[derive(Debug, Deserialize)]
pub struct ParametroFormato {
    #[serde(default = "formato_por_defecto")]
    pub formato: String,
}

fn formato_por_defecto() -> String {
    "csv".into()
}

// GET /api/informes/{tipo}/exportar?formato=csv
pub async fn exportar(
    State(state): State<AppState>,
    Ruta(tipo): Ruta<TipoInforme>,
    Consulta(filtros): Consulta<FiltrosInforme>,
    Consulta(parametro): Consulta<ParametroFormato>,
) -> AppResult<Response> {
    let fichero = exportacion::exportar(&state.db_pool, tipo, &filtros, &parametro.formato).await?;
    let disposicion = format!("attachment; filename=\"{}\"", fichero.nombre_fichero);
    Ok((
        [
            (header::CONTENT_TYPE, fichero.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposicion),
        ],
        fichero.contenido,
    )
        .into_response())
}
