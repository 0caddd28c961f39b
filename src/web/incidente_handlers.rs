// src/web/incidente_handlers.rs
use crate::{
    error::AppResult,
    models::{
        codigo::{ActualizarAsignacion, AsignacionCodigo, CodigoFacturacion, NuevaAsignacion},
        incidente::{ActualizarIncidente, CambioEstadoIncidente, FiltrosIncidentes, IncidenteConGuardia, NuevoIncidente},
    },
    response::{ApiResponse, Creado},
    services::{asignacion_service, incidente_service},
    state::AppState,
    web::extract::{Consulta, Cuerpo, Ruta},
};
use axum::{
    extract::State,
    Json,
};

pub async fn crear(
    State(state): State<AppState>,
    Cuerpo(nuevo): Cuerpo<NuevoIncidente>,
) -> AppResult<Creado<IncidenteConGuardia>> {
    let incidente = incidente_service::crear(&state.db_pool, nuevo).await?;
    Ok(Creado(incidente))
}

pub async fn listar(
    State(state): State<AppState>,
    Consulta(filtros): Consulta<FiltrosIncidentes>,
) -> AppResult<Json<ApiResponse<Vec<IncidenteConGuardia>>>> {
    let incidentes = incidente_service::listar(&state.db_pool, &filtros).await?;
    Ok(Json(ApiResponse::ok(incidentes)))
}

pub async fn obtener(
    State(state): State<AppState>,
    Ruta(id): Ruta<String>,
) -> AppResult<Json<ApiResponse<IncidenteConGuardia>>> {
    let incidente = incidente_service::obtener(&state.db_pool, &id).await?;
    Ok(Json(ApiResponse::ok(incidente)))
}

pub async fn actualizar(
    State(state): State<AppState>,
    Ruta(id): Ruta<String>,
    Cuerpo(cambios): Cuerpo<ActualizarIncidente>,
) -> AppResult<Json<ApiResponse<IncidenteConGuardia>>> {
    let incidente = incidente_service::actualizar(&state.db_pool, &id, cambios).await?;
    Ok(Json(ApiResponse::ok(incidente)))
}

pub async fn eliminar(State(state): State<AppState>, Ruta(id): Ruta<String>) -> AppResult<Json<ApiResponse<()>>> {
    incidente_service::eliminar(&state.db_pool, &id).await?;
    Ok(Json(ApiResponse::ok_with_message((), "Incidente eliminado")))
}

pub async fn cambiar_estado(
    State(state): State<AppState>,
    Ruta(id): Ruta<String>,
    Cuerpo(cambio): Cuerpo<CambioEstadoIncidente>,
) -> AppResult<Json<ApiResponse<IncidenteConGuardia>>> {
    let incidente = incidente_service::cambiar_estado(&state.db_pool, &id, cambio).await?;
    Ok(Json(ApiResponse::ok(incidente)))
}

// --- Asignaciones ---

pub async fn listar_asignaciones(
    State(state): State<AppState>,
    Ruta(id): Ruta<String>,
) -> AppResult<Json<ApiResponse<Vec<AsignacionCodigo>>>> {
    let asignaciones = asignacion_service::listar(&state.db_pool, &id).await?;
    Ok(Json(ApiResponse::ok(asignaciones)))
}

pub async fn codigos_aplicables(
    State(state): State<AppState>,
    Ruta(id): Ruta<String>,
) -> AppResult<Json<ApiResponse<Vec<CodigoFacturacion>>>> {
    let codigos = asignacion_service::codigos_aplicables(&state.db_pool, &id).await?;
    Ok(Json(ApiResponse::ok(codigos)))
}

pub async fn asignar(
    State(state): State<AppState>,
    Ruta(id): Ruta<String>,
    Cuerpo(nueva): Cuerpo<NuevaAsignacion>,
) -> AppResult<Creado<AsignacionCodigo>> {
    let asignacion = asignacion_service::asignar(&state.db_pool, &id, nueva).await?;
    Ok(Creado(asignacion))
}

pub async fn actualizar_asignacion(
    State(state): State<AppState>,
    Ruta(id): Ruta<i64>,
    Cuerpo(cambio): Cuerpo<ActualizarAsignacion>,
) -> AppResult<Json<ApiResponse<AsignacionCodigo>>> {
    let asignacion = asignacion_service::actualizar(&state.db_pool, id, cambio.minutos).await?;
    Ok(Json(ApiResponse::ok(asignacion)))
}

pub async fn eliminar_asignacion(
    State(state): State<AppState>,
    Ruta(id): Ruta<i64>,
) -> AppResult<Json<ApiResponse<()>>> {
    asignacion_service::eliminar(&state.db_pool, id).await?;
    Ok(Json(ApiResponse::ok_with_message((), "Asignación eliminada")))
}
