// src/services/guardia_service.rs
use crate::{
    error::{AppError, AppResult},
    models::guardia::{
        es_fin_de_semana, ActualizarGuardia, FilaFallida, FiltrosGuardias, Guardia, NuevaGuardia,
        ResultadoImportacion,
    },
    services::calendario::CalendarioFeriados,
};
use chrono::NaiveDate;
use csv::StringRecord;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::collections::HashMap;
use uuid::Uuid;

const SELECT_GUARDIA: &str =
    "SELECT id, usuario, fecha, es_feriado, es_fin_de_semana, notas, created_at FROM guardias";

pub fn parsear_fecha(valor: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(valor.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::validation("fecha", format!("'{}' no es una fecha YYYY-MM-DD", valor)))
}

fn validar_usuario(usuario: &str) -> AppResult<String> {
    let usuario = usuario.trim();
    if usuario.is_empty() {
        return Err(AppError::validation("usuario", "no puede estar vacío"));
    }
    Ok(usuario.to_string())
}

fn es_duplicado(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

pub async fn find_by_id(conn: &mut SqliteConnection, id: &str) -> AppResult<Option<Guardia>> {
    let guardia = sqlx::query_as::<_, Guardia>(&format!("{} WHERE id = ?", SELECT_GUARDIA))
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(guardia)
}

pub async fn obtener(pool: &SqlitePool, id: &str) -> AppResult<Guardia> {
    let mut conn = pool.acquire().await?;
    find_by_id(&mut conn, id)
        .await?
        .ok_or_else(|| AppError::not_found("Guardia", id))
}

/// Registra una guardia; (usuario, fecha) es única.
pub async fn crear(
    pool: &SqlitePool,
    calendario: &dyn CalendarioFeriados,
    nueva: NuevaGuardia,
) -> AppResult<Guardia> {
    let usuario = validar_usuario(&nueva.usuario)?;
    let fecha = parsear_fecha(&nueva.fecha)?;
    let es_feriado = calendario.es_feriado(fecha)?;
    let notas = nueva.notas.filter(|n| !n.trim().is_empty());

    let id = Uuid::new_v4().to_string();
    let resultado = sqlx::query(
        "INSERT INTO guardias (id, usuario, fecha, es_feriado, es_fin_de_semana, notas) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&usuario)
    .bind(fecha)
    .bind(es_feriado)
    .bind(es_fin_de_semana(fecha))
    .bind(&notas)
    .execute(pool)
    .await;

    match resultado {
        Err(e) if es_duplicado(&e) => {
            tracing::warn!("Guardia duplicada para '{}' el {}", usuario, fecha);
            return Err(AppError::DuplicateShift {
                usuario,
                fecha: fecha.to_string(),
            });
        }
        r => {
            r.map_err(AppError::from_db)?;
        }
    }

    tracing::info!("✅ Guardia {} creada para '{}' el {}", id, usuario, fecha);
    obtener(pool, &id).await
}

pub async fn listar(pool: &SqlitePool, filtros: &FiltrosGuardias) -> AppResult<Vec<Guardia>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_GUARDIA);
    qb.push(" WHERE 1 = 1");
    if let Some(usuario) = &filtros.usuario {
        qb.push(" AND usuario = ").push_bind(usuario.clone());
    }
    if let Some(desde) = filtros.desde {
        qb.push(" AND fecha >= ").push_bind(desde);
    }
    if let Some(hasta) = filtros.hasta {
        qb.push(" AND fecha <= ").push_bind(hasta);
    }
    qb.push(" ORDER BY fecha ASC, usuario ASC");

    let guardias = qb.build_query_as::<Guardia>().fetch_all(pool).await?;
    tracing::debug!("Encontradas {} guardias.", guardias.len());
    Ok(guardias)
}

/// Cambia notas y/o fecha. Un cambio de fecha reclasifica el día.
pub async fn actualizar(
    pool: &SqlitePool,
    calendario: &dyn CalendarioFeriados,
    id: &str,
    cambios: ActualizarGuardia,
) -> AppResult<Guardia> {
    let mut tx = pool.begin().await?;
    let actual = find_by_id(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::not_found("Guardia", id))?;

    let fecha = match &cambios.fecha {
        Some(f) => parsear_fecha(f)?,
        None => actual.fecha,
    };

    // La fecha decide la aplicabilidad de los códigos y el periodo de liquidación
    if fecha != actual.fecha {
        let (avanzados, asignaciones): (i64, i64) = sqlx::query_as(
            "SELECT \
                 (SELECT COUNT(*) FROM incidentes WHERE guardia_id = ?1 AND estado IN ('aprobado', 'liquidado')), \
                 (SELECT COUNT(*) FROM asignaciones_codigo a JOIN incidentes i ON i.id = a.incidente_id \
                  WHERE i.guardia_id = ?1)",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::from_db)?;
        if avanzados > 0 {
            return Err(AppError::Conflict(
                "La guardia tiene incidentes aprobados o liquidados; su fecha no puede cambiar".into(),
            ));
        }
        if asignaciones > 0 {
            return Err(AppError::Conflict(
                "La guardia tiene códigos asignados; retírelos antes de cambiar la fecha".into(),
            ));
        }
    }

    let es_feriado = if fecha != actual.fecha {
        calendario.es_feriado(fecha)?
    } else {
        actual.es_feriado
    };
    let notas = match cambios.notas {
        Some(n) if n.trim().is_empty() => None,
        Some(n) => Some(n),
        None => actual.notas,
    };

    let resultado = sqlx::query(
        "UPDATE guardias SET fecha = ?, es_feriado = ?, es_fin_de_semana = ?, notas = ? WHERE id = ?",
    )
    .bind(fecha)
    .bind(es_feriado)
    .bind(es_fin_de_semana(fecha))
    .bind(&notas)
    .bind(id)
    .execute(&mut *tx)
    .await;

    match resultado {
        Err(e) if es_duplicado(&e) => {
            return Err(AppError::DuplicateShift {
                usuario: actual.usuario,
                fecha: fecha.to_string(),
            });
        }
        r => {
            r.map_err(AppError::from_db)?;
        }
    }

    let guardia = find_by_id(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::not_found("Guardia", id))?;
    tx.commit().await.map_err(AppError::from_db)?;
    tracing::info!("Guardia {} actualizada.", id);
    Ok(guardia)
}

/// Borra una guardia sin incidentes.
pub async fn eliminar(pool: &SqlitePool, id: &str) -> AppResult<()> {
    let mut tx = pool.begin().await?;
    let incidentes: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM incidentes WHERE guardia_id = ?")
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
    if incidentes > 0 {
        return Err(AppError::Conflict(format!(
            "La guardia tiene {} incidente(s); elimínelos antes",
            incidentes
        )));
    }

    let rows = sqlx::query("DELETE FROM guardias WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(AppError::from_db)?
        .rows_affected();
    if rows == 0 {
        return Err(AppError::not_found("Guardia", id));
    }
    tx.commit().await.map_err(AppError::from_db)?;
    tracing::info!("Guardia {} eliminada.", id);
    Ok(())
}

// --- Importación masiva ---

fn validar_cabeceras(headers: &StringRecord) -> AppResult<HashMap<String, usize>> {
    let mapa: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| (h.trim().to_lowercase(), i))
        .collect();
    for requerida in ["usuario", "fecha"] {
        if !mapa.contains_key(requerida) {
            return Err(AppError::validation(
                "cabecera",
                format!("falta la columna '{}'", requerida),
            ));
        }
    }
    Ok(mapa)
}

fn fila_a_guardia(record: &StringRecord, columnas: &HashMap<String, usize>) -> NuevaGuardia {
    let campo = |nombre: &str| {
        columnas
            .get(nombre)
            .and_then(|&i| record.get(i))
            .map(|v| v.trim().to_string())
    };
    NuevaGuardia {
        usuario: campo("usuario").unwrap_or_default(),
        fecha: campo("fecha").unwrap_or_default(),
        notas: campo("notas").filter(|n| !n.is_empty()),
    }
}

fn motivo_de(err: &AppError) -> String {
    match err {
        AppError::SqlxError(_) | AppError::InternalServerError => "error interno al guardar la fila".into(),
        otro => otro.to_string(),
    }
}

/// Importa guardias desde CSV (`usuario,fecha[,notas]`).
///
/// Cada fila se valida y confirma por separado: los fallos se acumulan en el
/// informe y no detienen el resto. Sólo una cabecera inválida rechaza el fichero.
pub async fn importar(
    pool: &SqlitePool,
    calendario: &dyn CalendarioFeriados,
    contenido_csv: &str,
) -> AppResult<ResultadoImportacion> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(contenido_csv.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| AppError::validation("cabecera", format!("CSV ilegible: {}", e)))?
        .clone();
    let columnas = validar_cabeceras(&headers)?;

    let mut resultado = ResultadoImportacion::default();
    for (idx, registro) in reader.records().enumerate() {
        let fila = idx + 1;
        let record = match registro {
            Ok(r) => r,
            Err(e) => {
                resultado.fallidas.push(FilaFallida { fila, motivo: format!("CSV inválido: {}", e) });
                continue;
            }
        };

        match crear(pool, calendario, fila_a_guardia(&record, &columnas)).await {
            Ok(guardia) => resultado.creadas.push(guardia),
            Err(e) => {
                tracing::debug!("Fila {} rechazada: {}", fila, e);
                resultado.fallidas.push(FilaFallida { fila, motivo: motivo_de(&e) });
            }
        }
    }

    tracing::info!(
        "Importación terminada: {} creadas, {} fallidas.",
        resultado.creadas.len(),
        resultado.fallidas.len()
    );
    Ok(resultado)
}
