// src/services/liquidacion_service.rs
use crate::{
    dinero,
    error::{AppError, AppResult},
    models::liquidacion::{
        DetalleLiquidacion, EstadoLiquidacion, FiltrosLiquidaciones, GenerarLiquidacion, Liquidacion,
        LiquidacionCompleta, Periodo,
    },
};
use chrono::Local;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::collections::BTreeMap;
use uuid::Uuid;

const SELECT_LIQUIDACION: &str = "SELECT id, periodo, fecha_generacion, estado, observaciones, \
     total_minutos, total_importe FROM liquidaciones";

/// Incidente aprobado candidato a entrar en el lote.
#[derive(Debug, FromRow)]
struct Candidato {
    id: String,
    usuario: String,
    total_minutos: i64,
    total_importe: i64,
}

async fn find_by_id(conn: &mut SqliteConnection, id: &str) -> AppResult<Option<Liquidacion>> {
    let liquidacion = sqlx::query_as::<_, Liquidacion>(&format!("{} WHERE id = ?", SELECT_LIQUIDACION))
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(liquidacion)
}

pub async fn obtener(pool: &SqlitePool, id: &str) -> AppResult<LiquidacionCompleta> {
    let mut conn = pool.acquire().await?;
    let liquidacion = find_by_id(&mut conn, id)
        .await?
        .ok_or_else(|| AppError::not_found("Liquidacion", id))?;

    let detalles = sqlx::query_as::<_, DetalleLiquidacion>(
        "SELECT id, liquidacion_id, usuario, total_minutos, total_importe \
         FROM detalles_liquidacion WHERE liquidacion_id = ? ORDER BY usuario ASC",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    let incidentes: Vec<String> =
        sqlx::query_scalar("SELECT id FROM incidentes WHERE liquidacion_id = ? ORDER BY inicio ASC")
            .bind(id)
            .fetch_all(&mut *conn)
            .await?;

    Ok(LiquidacionCompleta {
        liquidacion,
        detalles,
        incidentes,
    })
}

pub async fn listar(pool: &SqlitePool, filtros: &FiltrosLiquidaciones) -> AppResult<Vec<Liquidacion>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_LIQUIDACION);
    qb.push(" WHERE 1 = 1");
    if let Some(periodo) = filtros.periodo {
        qb.push(" AND periodo = ").push_bind(periodo.to_string());
    }
    if let Some(estado) = filtros.estado {
        qb.push(" AND estado = ").push_bind(estado);
    }
    qb.push(" ORDER BY periodo DESC, fecha_generacion DESC");
    let liquidaciones = qb.build_query_as::<Liquidacion>().fetch_all(pool).await?;
    Ok(liquidaciones)
}

/// Genera el lote de un periodo.
///
/// Un conflicto de concurrencia se reintenta una vez; en el reintento el
/// perdedor normalmente ve el lote del ganador y falla con
/// `PeriodAlreadySettled`.
pub async fn generar(pool: &SqlitePool, peticion: GenerarLiquidacion) -> AppResult<LiquidacionCompleta> {
    let id = match generar_en_transaccion(pool, &peticion).await {
        Err(AppError::ConcurrencyConflict(motivo)) => {
            tracing::warn!(
                "Conflicto al liquidar {} ({}); reintentando una vez",
                peticion.periodo,
                motivo
            );
            generar_en_transaccion(pool, &peticion).await?
        }
        r => r?,
    };
    obtener(pool, &id).await
}

/// Lote + detalles + paso de incidentes a `liquidado`, todo o nada.
async fn generar_en_transaccion(pool: &SqlitePool, peticion: &GenerarLiquidacion) -> AppResult<String> {
    let periodo = peticion.periodo;
    let mut tx = pool.begin().await.map_err(AppError::from_db)?;

    let vigente: Option<String> =
        sqlx::query_scalar("SELECT id FROM liquidaciones WHERE periodo = ? AND estado <> 'anulada'")
            .bind(periodo.to_string())
            .fetch_optional(&mut *tx)
            .await
            .map_err(AppError::from_db)?;
    if vigente.is_some() {
        return Err(AppError::PeriodAlreadySettled(periodo.to_string()));
    }

    // Insertar primero la cabecera: el índice único por periodo decide quién gana
    let id = Uuid::new_v4().to_string();
    let insertada = sqlx::query(
        "INSERT INTO liquidaciones (id, periodo, fecha_generacion, estado, observaciones) \
         VALUES (?, ?, ?, 'pendiente', ?)",
    )
    .bind(&id)
    .bind(periodo.to_string())
    .bind(Local::now().naive_local())
    .bind(&peticion.observaciones)
    .execute(&mut *tx)
    .await;
    match insertada {
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            return Err(AppError::PeriodAlreadySettled(periodo.to_string()));
        }
        r => {
            r.map_err(AppError::from_db)?;
        }
    }

    let candidatos = candidatos(&mut tx, periodo).await?;
    if candidatos.is_empty() {
        return Err(AppError::validation(
            "periodo",
            format!("no hay incidentes aprobados sin liquidar en {}", periodo),
        ));
    }

    // Agrupar por usuario
    let mut por_usuario: BTreeMap<&str, (i64, i64)> = BTreeMap::new();
    for c in &candidatos {
        let acumulado = por_usuario.entry(c.usuario.as_str()).or_default();
        acumulado.0 += c.total_minutos;
        acumulado.1 += c.total_importe;
    }

    for (usuario, (minutos, importe)) in &por_usuario {
        sqlx::query(
            "INSERT INTO detalles_liquidacion (liquidacion_id, usuario, total_minutos, total_importe) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(*usuario)
        .bind(minutos)
        .bind(importe)
        .execute(&mut *tx)
        .await
        .map_err(AppError::from_db)?;
    }

    // Compare-and-swap: sólo filas que sigan 'aprobado' y sin lote
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE incidentes SET estado = 'liquidado', liquidacion_id = ");
    qb.push_bind(&id);
    qb.push(" WHERE estado = 'aprobado' AND liquidacion_id IS NULL AND id IN (");
    let mut ids = qb.separated(", ");
    for c in &candidatos {
        ids.push_bind(&c.id);
    }
    ids.push_unseparated(")");
    let marcados = qb
        .build()
        .execute(&mut *tx)
        .await
        .map_err(AppError::from_db)?
        .rows_affected();
    if marcados != candidatos.len() as u64 {
        return Err(AppError::ConcurrencyConflict(format!(
            "{} de {} incidentes cambiaron durante la liquidación",
            candidatos.len() as u64 - marcados,
            candidatos.len()
        )));
    }

    let total_minutos: i64 = por_usuario.values().map(|(m, _)| m).sum();
    let total_importe: i64 = por_usuario.values().map(|(_, i)| i).sum();
    sqlx::query("UPDATE liquidaciones SET total_minutos = ?, total_importe = ? WHERE id = ?")
        .bind(total_minutos)
        .bind(total_importe)
        .bind(&id)
        .execute(&mut *tx)
        .await
        .map_err(AppError::from_db)?;

    tx.commit().await.map_err(AppError::from_db)?;

    tracing::info!(
        "✅ Liquidación {} de {}: {} incidentes, {} usuarios, {} min, {}",
        id,
        periodo,
        candidatos.len(),
        por_usuario.len(),
        total_minutos,
        dinero::a_decimal(total_importe)
    );
    Ok(id)
}

async fn candidatos(conn: &mut SqliteConnection, periodo: Periodo) -> AppResult<Vec<Candidato>> {
    sqlx::query_as::<_, Candidato>(
        "SELECT i.id, g.usuario, i.total_minutos, i.total_importe \
         FROM incidentes i JOIN guardias g ON g.id = i.guardia_id \
         WHERE i.estado = 'aprobado' AND i.liquidacion_id IS NULL \
           AND g.fecha >= ? AND g.fecha < ? \
         ORDER BY g.usuario, i.inicio",
    )
    .bind(periodo.primer_dia())
    .bind(periodo.fin_exclusivo())
    .fetch_all(conn)
    .await
    .map_err(AppError::from_db)
}

/// Avanza el lote un paso: pendiente → enviada → procesada → cerrada.
pub async fn cambiar_estado(
    pool: &SqlitePool,
    id: &str,
    nuevo: EstadoLiquidacion,
) -> AppResult<LiquidacionCompleta> {
    let mut tx = pool.begin().await?;
    let actual = find_by_id(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::not_found("Liquidacion", id))?;

    if !actual.estado.puede_pasar_a(nuevo) {
        tracing::warn!("Transición rechazada para liquidación {}: {} -> {}", id, actual.estado, nuevo);
        return Err(AppError::transition(actual.estado, nuevo));
    }

    let rows = sqlx::query("UPDATE liquidaciones SET estado = ? WHERE id = ? AND estado = ?")
        .bind(nuevo)
        .bind(id)
        .bind(actual.estado)
        .execute(&mut *tx)
        .await
        .map_err(AppError::from_db)?
        .rows_affected();
    if rows == 0 {
        return Err(AppError::ConcurrencyConflict(format!("la liquidación {} cambió de estado", id)));
    }
    tx.commit().await.map_err(AppError::from_db)?;

    tracing::info!("Liquidación {}: {} -> {}", id, actual.estado, nuevo);
    obtener(pool, id).await
}

/// Anula un lote `pendiente` y devuelve sus incidentes a `aprobado`.
pub async fn anular(pool: &SqlitePool, id: &str) -> AppResult<LiquidacionCompleta> {
    let mut tx = pool.begin().await?;
    let actual = find_by_id(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::not_found("Liquidacion", id))?;

    if actual.estado != EstadoLiquidacion::Pendiente {
        return Err(AppError::transition(actual.estado, EstadoLiquidacion::Anulada));
    }

    let rows = sqlx::query("UPDATE liquidaciones SET estado = 'anulada' WHERE id = ? AND estado = 'pendiente'")
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(AppError::from_db)?
        .rows_affected();
    if rows == 0 {
        return Err(AppError::ConcurrencyConflict(format!("la liquidación {} cambió de estado", id)));
    }

    let liberados = sqlx::query(
        "UPDATE incidentes SET estado = 'aprobado', liquidacion_id = NULL \
         WHERE liquidacion_id = ? AND estado = 'liquidado'",
    )
    .bind(id)
    .execute(&mut *tx)
    .await
    .map_err(AppError::from_db)?
    .rows_affected();
    tx.commit().await.map_err(AppError::from_db)?;

    tracing::info!("Liquidación {} anulada; {} incidentes vuelven a 'aprobado'", id, liberados);
    obtener(pool, id).await
}
