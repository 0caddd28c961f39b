// src/web/guardia_handlers.rs
use crate::{
    error::AppResult,
    models::{
        guardia::{ActualizarGuardia, FiltrosGuardias, Guardia, NuevaGuardia, ResultadoImportacion},
        incidente::IncidenteConGuardia,
    },
    response::{ApiResponse, Creado},
    services::{guardia_service, incidente_service},
    state::AppState,
    web::extract::{Consulta, Cuerpo, Ruta},
};
use axum::{
    extract::State,
    Json,
};

pub async fn crear(
    State(state): State<AppState>,
    Cuerpo(nueva): Cuerpo<NuevaGuardia>,
) -> AppResult<Creado<Guardia>> {
    let guardia = guardia_service::crear(&state.db_pool, state.calendario.as_ref(), nueva).await?;
    Ok(Creado(guardia))
}

pub async fn listar(
    State(state): State<AppState>,
    Consulta(filtros): Consulta<FiltrosGuardias>,
) -> AppResult<Json<ApiResponse<Vec<Guardia>>>> {
    let guardias = guardia_service::listar(&state.db_pool, &filtros).await?;
    Ok(Json(ApiResponse::ok(guardias)))
}

pub async fn obtener(
    State(state): State<AppState>,
    Ruta(id): Ruta<String>,
) -> AppResult<Json<ApiResponse<Guardia>>> {
    let guardia = guardia_service::obtener(&state.db_pool, &id).await?;
    Ok(Json(ApiResponse::ok(guardia)))
}

pub async fn actualizar(
    State(state): State<AppState>,
    Ruta(id): Ruta<String>,
    Cuerpo(cambios): Cuerpo<ActualizarGuardia>,
) -> AppResult<Json<ApiResponse<Guardia>>> {
    let guardia = guardia_service::actualizar(&state.db_pool, state.calendario.as_ref(), &id, cambios).await?;
    Ok(Json(ApiResponse::ok(guardia)))
}

pub async fn eliminar(State(state): State<AppState>, Ruta(id): Ruta<String>) -> AppResult<Json<ApiResponse<()>>> {
    guardia_service::eliminar(&state.db_pool, &id).await?;
    Ok(Json(ApiResponse::ok_with_message((), "Guardia eliminada")))
}

/// El cuerpo es el CSV tal cual (`usuario,fecha[,notas]`).
pub async fn importar(
    State(state): State<AppState>,
    cuerpo: String,
) -> AppResult<Json<ApiResponse<ResultadoImportacion>>> {
    let resultado = guardia_service::importar(&state.db_pool, state.calendario.as_ref(), &cuerpo).await?;
    let mensaje = format!(
        "{} guardias creadas, {} filas con error",
        resultado.creadas.len(),
        resultado.fallidas.len()
    );
    Ok(Json(ApiResponse::ok_with_message(resultado, mensaje)))
}

pub async fn incidentes(
    State(state): State<AppState>,
    Ruta(id): Ruta<String>,
) -> AppResult<Json<ApiResponse<Vec<IncidenteConGuardia>>>> {
    let incidentes = incidente_service::listar_por_guardia(&state.db_pool, &id).await?;
    Ok(Json(ApiResponse::ok(incidentes)))
}
