// src/services/incidente_service.rs
use crate::{
    error::{AppError, AppResult},
    models::incidente::{
        duracion_minutos, ActualizarIncidente, CambioEstadoIncidente, EstadoIncidente,
        FiltrosIncidentes, Incidente, IncidenteConGuardia, NuevoIncidente,
    },
    services::guardia_service,
};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use uuid::Uuid;

const SELECT_INCIDENTE: &str = "SELECT id, guardia_id, inicio, fin, duracion_minutos, descripcion, estado, \
     observaciones, total_minutos, total_importe, liquidacion_id, created_at FROM incidentes";

pub(crate) const SELECT_INCIDENTE_CON_GUARDIA: &str = "SELECT i.id, i.guardia_id, i.inicio, i.fin, \
     i.duracion_minutos, i.descripcion, i.estado, i.observaciones, i.total_minutos, i.total_importe, \
     i.liquidacion_id, i.created_at, g.usuario, g.fecha, g.es_feriado, g.es_fin_de_semana \
     FROM incidentes i JOIN guardias g ON g.id = i.guardia_id";

pub async fn find_by_id(conn: &mut SqliteConnection, id: &str) -> AppResult<Option<Incidente>> {
    let incidente = sqlx::query_as::<_, Incidente>(&format!("{} WHERE id = ?", SELECT_INCIDENTE))
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(incidente)
}

pub async fn find_con_guardia(
    conn: &mut SqliteConnection,
    id: &str,
) -> AppResult<Option<IncidenteConGuardia>> {
    let incidente = sqlx::query_as::<_, IncidenteConGuardia>(&format!(
        "{} WHERE i.id = ?",
        SELECT_INCIDENTE_CON_GUARDIA
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(incidente)
}

pub async fn obtener(pool: &SqlitePool, id: &str) -> AppResult<IncidenteConGuardia> {
    let mut conn = pool.acquire().await?;
    find_con_guardia(&mut conn, id)
        .await?
        .ok_or_else(|| AppError::not_found("Incidente", id))
}

fn validar_descripcion(descripcion: &str) -> AppResult<String> {
    let descripcion = descripcion.trim();
    if descripcion.is_empty() {
        return Err(AppError::validation("descripcion", "no puede estar vacía"));
    }
    Ok(descripcion.to_string())
}

/// Registra un incidente en una guardia existente; nace `registrado`.
pub async fn crear(pool: &SqlitePool, nuevo: NuevoIncidente) -> AppResult<IncidenteConGuardia> {
    let duracion = duracion_minutos(nuevo.inicio, nuevo.fin)
        .ok_or_else(|| AppError::validation("fin", "debe ser posterior a inicio"))?;
    let descripcion = validar_descripcion(&nuevo.descripcion)?;

    let mut tx = pool.begin().await?;
    guardia_service::find_by_id(&mut tx, &nuevo.guardia_id)
        .await?
        .ok_or_else(|| AppError::not_found("Guardia", &nuevo.guardia_id))?;

    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO incidentes (id, guardia_id, inicio, fin, duracion_minutos, descripcion, estado, observaciones) \
         VALUES (?, ?, ?, ?, ?, ?, 'registrado', ?)",
    )
    .bind(&id)
    .bind(&nuevo.guardia_id)
    .bind(nuevo.inicio)
    .bind(nuevo.fin)
    .bind(duracion)
    .bind(&descripcion)
    .bind(&nuevo.observaciones)
    .execute(&mut *tx)
    .await
    .map_err(AppError::from_db)?;

    let incidente = find_con_guardia(&mut tx, &id)
        .await?
        .ok_or(AppError::InternalServerError)?;
    tx.commit().await.map_err(AppError::from_db)?;

    tracing::info!(
        "✅ Incidente {} registrado en guardia {} ({} min)",
        id,
        nuevo.guardia_id,
        duracion
    );
    Ok(incidente)
}

pub async fn listar(pool: &SqlitePool, filtros: &FiltrosIncidentes) -> AppResult<Vec<IncidenteConGuardia>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_INCIDENTE_CON_GUARDIA);
    qb.push(" WHERE 1 = 1");
    if let Some(guardia_id) = &filtros.guardia_id {
        qb.push(" AND i.guardia_id = ").push_bind(guardia_id.clone());
    }
    if let Some(estado) = filtros.estado {
        qb.push(" AND i.estado = ").push_bind(estado);
    }
    if let Some(usuario) = &filtros.usuario {
        qb.push(" AND g.usuario = ").push_bind(usuario.clone());
    }
    if let Some(desde) = filtros.desde {
        qb.push(" AND g.fecha >= ").push_bind(desde);
    }
    if let Some(hasta) = filtros.hasta {
        qb.push(" AND g.fecha <= ").push_bind(hasta);
    }
    qb.push(" ORDER BY i.inicio ASC");

    let incidentes = qb.build_query_as::<IncidenteConGuardia>().fetch_all(pool).await?;
    tracing::debug!("Encontrados {} incidentes.", incidentes.len());
    Ok(incidentes)
}

pub async fn listar_por_guardia(pool: &SqlitePool, guardia_id: &str) -> AppResult<Vec<IncidenteConGuardia>> {
    guardia_service::obtener(pool, guardia_id).await?;
    let filtros = FiltrosIncidentes {
        guardia_id: Some(guardia_id.to_string()),
        ..Default::default()
    };
    listar(pool, &filtros).await
}

/// Minutos ya imputados a códigos.
pub async fn minutos_asignados(conn: &mut SqliteConnection, incidente_id: &str) -> AppResult<i64> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(minutos), 0) FROM asignaciones_codigo WHERE incidente_id = ?",
    )
    .bind(incidente_id)
    .fetch_one(conn)
    .await?;
    Ok(total)
}

/// Recalcula total_minutos/total_importe desde las asignaciones.
/// Debe ejecutarse en la misma transacción que modificó las asignaciones.
pub async fn recalcular_totales(conn: &mut SqliteConnection, incidente_id: &str) -> AppResult<()> {
    sqlx::query(
        "UPDATE incidentes SET \
            total_minutos = (SELECT COALESCE(SUM(minutos), 0) FROM asignaciones_codigo WHERE incidente_id = ?1), \
            total_importe = (SELECT COALESCE(SUM(importe), 0) FROM asignaciones_codigo WHERE incidente_id = ?1) \
         WHERE id = ?1",
    )
    .bind(incidente_id)
    .execute(conn)
    .await
    .map_err(AppError::from_db)?;
    Ok(())
}

/// Edita datos de un incidente `registrado` o `revisado`.
pub async fn actualizar(
    pool: &SqlitePool,
    id: &str,
    cambios: ActualizarIncidente,
) -> AppResult<IncidenteConGuardia> {
    let mut tx = pool.begin().await?;
    let actual = find_by_id(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::not_found("Incidente", id))?;

    if !actual.estado.es_editable() {
        return Err(AppError::Conflict(format!(
            "Un incidente {} no se puede editar",
            actual.estado
        )));
    }

    let inicio = cambios.inicio.unwrap_or(actual.inicio);
    let fin = cambios.fin.unwrap_or(actual.fin);
    let duracion = duracion_minutos(inicio, fin)
        .ok_or_else(|| AppError::validation("fin", "debe ser posterior a inicio"))?;

    let asignados = minutos_asignados(&mut tx, id).await?;
    if duracion < asignados {
        return Err(AppError::validation(
            "fin",
            format!("la duración ({} min) no cubre los {} min ya asignados", duracion, asignados),
        ));
    }

    let descripcion = match &cambios.descripcion {
        Some(d) => validar_descripcion(d)?,
        None => actual.descripcion,
    };
    let observaciones = cambios.observaciones.or(actual.observaciones);

    // CAS sobre el estado leído
    let rows = sqlx::query(
        "UPDATE incidentes SET inicio = ?, fin = ?, duracion_minutos = ?, descripcion = ?, observaciones = ? \
         WHERE id = ? AND estado = ?",
    )
    .bind(inicio)
    .bind(fin)
    .bind(duracion)
    .bind(&descripcion)
    .bind(&observaciones)
    .bind(id)
    .bind(actual.estado)
    .execute(&mut *tx)
    .await
    .map_err(AppError::from_db)?
    .rows_affected();
    if rows == 0 {
        return Err(AppError::ConcurrencyConflict(format!("el incidente {} cambió de estado", id)));
    }

    let incidente = find_con_guardia(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::not_found("Incidente", id))?;
    tx.commit().await.map_err(AppError::from_db)?;
    tracing::info!("Incidente {} actualizado.", id);
    Ok(incidente)
}

/// Borra un incidente que no esté aprobado ni liquidado (con sus asignaciones).
pub async fn eliminar(pool: &SqlitePool, id: &str) -> AppResult<()> {
    let mut tx = pool.begin().await?;
    let actual = find_by_id(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::not_found("Incidente", id))?;

    if matches!(actual.estado, EstadoIncidente::Aprobado | EstadoIncidente::Liquidado) {
        return Err(AppError::Conflict(format!(
            "Un incidente {} no se puede eliminar",
            actual.estado
        )));
    }

    sqlx::query("DELETE FROM asignaciones_codigo WHERE incidente_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(AppError::from_db)?;
    let rows = sqlx::query("DELETE FROM incidentes WHERE id = ? AND estado = ?")
        .bind(id)
        .bind(actual.estado)
        .execute(&mut *tx)
        .await
        .map_err(AppError::from_db)?
        .rows_affected();
    if rows == 0 {
        return Err(AppError::ConcurrencyConflict(format!("el incidente {} cambió de estado", id)));
    }
    tx.commit().await.map_err(AppError::from_db)?;
    tracing::info!("Incidente {} eliminado.", id);
    Ok(())
}

/// Aplica una transición de revisión. Una arista no permitida deja el estado intacto.
pub async fn cambiar_estado(
    pool: &SqlitePool,
    id: &str,
    cambio: CambioEstadoIncidente,
) -> AppResult<IncidenteConGuardia> {
    let mut tx = pool.begin().await?;
    let actual = find_by_id(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::not_found("Incidente", id))?;

    if !actual.estado.puede_pasar_a(cambio.nuevo_estado) {
        tracing::warn!(
            "Transición rechazada para incidente {}: {} -> {}",
            id,
            actual.estado,
            cambio.nuevo_estado
        );
        return Err(AppError::transition(actual.estado, cambio.nuevo_estado));
    }

    let rows = sqlx::query(
        "UPDATE incidentes SET estado = ?, observaciones = COALESCE(?, observaciones) \
         WHERE id = ? AND estado = ?",
    )
    .bind(cambio.nuevo_estado)
    .bind(&cambio.observaciones)
    .bind(id)
    .bind(actual.estado)
    .execute(&mut *tx)
    .await
    .map_err(AppError::from_db)?
    .rows_affected();
    if rows == 0 {
        return Err(AppError::ConcurrencyConflict(format!("el incidente {} cambió de estado", id)));
    }

    let incidente = find_con_guardia(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::not_found("Incidente", id))?;
    tx.commit().await.map_err(AppError::from_db)?;
    tracing::info!("Incidente {}: {} -> {}", id, actual.estado, cambio.nuevo_estado);
    Ok(incidente)
}
