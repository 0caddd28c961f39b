// src/services/asignacion_service.rs
//! Reparto de la duración de un incidente entre códigos de facturación.
//!
//! Cada operación modifica las asignaciones y recalcula los totales del
//! incidente dentro de la misma transacción, de modo que siempre se cumple
//! `total_minutos == Σ minutos`, `total_importe == Σ importe` y
//! `Σ minutos <= duracion_minutos`.

use crate::{
    dinero,
    error::{AppError, AppResult},
    models::{
        codigo::{AsignacionCodigo, CodigoFacturacion, NuevaAsignacion},
        incidente::{Incidente, IncidenteConGuardia},
    },
    services::{codigo_service, incidente_service},
};
use sqlx::{SqliteConnection, SqlitePool};

const SELECT_ASIGNACION: &str = "SELECT a.id, a.incidente_id, a.codigo_id, c.codigo, a.minutos, a.tarifa, \
     a.importe, a.created_at FROM asignaciones_codigo a JOIN codigos_facturacion c ON c.id = a.codigo_id";

async fn find_by_id(conn: &mut SqliteConnection, id: i64) -> AppResult<Option<AsignacionCodigo>> {
    let asignacion = sqlx::query_as::<_, AsignacionCodigo>(&format!("{} WHERE a.id = ?", SELECT_ASIGNACION))
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(asignacion)
}

fn validar_minutos(minutos: i64) -> AppResult<()> {
    if minutos <= 0 {
        return Err(AppError::validation("minutos", "deben ser mayores que cero"));
    }
    Ok(())
}

fn exigir_modificable(incidente: &Incidente) -> AppResult<()> {
    if !incidente.estado.admite_asignaciones() {
        return Err(AppError::Conflict(format!(
            "El incidente {} está {}; sus asignaciones son inmutables",
            incidente.id, incidente.estado
        )));
    }
    Ok(())
}

fn validar_codigo(codigo: &CodigoFacturacion, incidente: &IncidenteConGuardia) -> AppResult<()> {
    if !codigo.activo {
        return Err(AppError::validation(
            "codigo_id",
            format!("el código {} está inactivo", codigo.codigo),
        ));
    }
    if !codigo.aplicabilidad.admite(incidente.es_feriado, incidente.es_fin_de_semana) {
        return Err(AppError::validation(
            "codigo_id",
            format!("el código {} no aplica al tipo de día de la guardia", codigo.codigo),
        ));
    }
    Ok(())
}

fn validar_tope(asignados: i64, nuevos: i64, duracion: i64) -> AppResult<()> {
    if asignados + nuevos > duracion {
        return Err(AppError::validation(
            "minutos",
            format!(
                "{} min superan la duración del incidente ({} min, {} ya asignados)",
                nuevos, duracion, asignados
            ),
        ));
    }
    Ok(())
}

pub async fn listar(pool: &SqlitePool, incidente_id: &str) -> AppResult<Vec<AsignacionCodigo>> {
    incidente_service::obtener(pool, incidente_id).await?;
    let asignaciones = sqlx::query_as::<_, AsignacionCodigo>(&format!(
        "{} WHERE a.incidente_id = ? ORDER BY a.id ASC",
        SELECT_ASIGNACION
    ))
    .bind(incidente_id)
    .fetch_all(pool)
    .await?;
    Ok(asignaciones)
}

/// Códigos activos cuyo predicado admite el tipo de día de la guardia del incidente.
pub async fn codigos_aplicables(pool: &SqlitePool, incidente_id: &str) -> AppResult<Vec<CodigoFacturacion>> {
    let incidente = incidente_service::obtener(pool, incidente_id).await?;
    let codigos = codigo_service::listar(pool, true)
        .await?
        .into_iter()
        .filter(|c| c.aplicabilidad.admite(incidente.es_feriado, incidente.es_fin_de_semana))
        .collect();
    Ok(codigos)
}

/// Asigna minutos de un incidente a un código, congelando tarifa e importe.
pub async fn asignar(
    pool: &SqlitePool,
    incidente_id: &str,
    nueva: NuevaAsignacion,
) -> AppResult<AsignacionCodigo> {
    validar_minutos(nueva.minutos)?;

    let mut tx = pool.begin().await?;
    let incidente = incidente_service::find_con_guardia(&mut tx, incidente_id)
        .await?
        .ok_or_else(|| AppError::not_found("Incidente", incidente_id))?;
    exigir_modificable(&incidente.incidente)?;

    let codigo = codigo_service::find_by_id(&mut tx, nueva.codigo_id)
        .await?
        .ok_or_else(|| AppError::not_found("CodigoFacturacion", nueva.codigo_id))?;
    validar_codigo(&codigo, &incidente)?;

    let asignados = incidente_service::minutos_asignados(&mut tx, incidente_id).await?;
    validar_tope(asignados, nueva.minutos, incidente.incidente.duracion_minutos)?;
    let importe = dinero::importe(nueva.minutos, codigo.tarifa)?;

    // La condición se repite en el INSERT: si otra escritura se adelantó, no inserta nada
    let resultado = sqlx::query_scalar::<_, i64>(
        "INSERT INTO asignaciones_codigo (incidente_id, codigo_id, minutos, tarifa, importe) \
         SELECT ?1, ?2, ?3, ?4, ?5 \
         WHERE (SELECT COALESCE(SUM(minutos), 0) FROM asignaciones_codigo WHERE incidente_id = ?1) + ?3 \
             <= (SELECT duracion_minutos FROM incidentes \
                 WHERE id = ?1 AND estado NOT IN ('liquidado', 'rechazado')) \
         RETURNING id",
    )
    .bind(incidente_id)
    .bind(codigo.id)
    .bind(nueva.minutos)
    .bind(codigo.tarifa)
    .bind(importe)
    .fetch_optional(&mut *tx)
    .await;

    let id = match resultado {
        Ok(Some(id)) => id,
        Ok(None) => {
            return Err(AppError::ConcurrencyConflict(format!(
                "el incidente {} cambió durante la asignación",
                incidente_id
            )))
        }
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            return Err(AppError::validation(
                "codigo_id",
                format!("el código {} ya está asignado; actualice esa asignación", codigo.codigo),
            ));
        }
        Err(e) => return Err(AppError::from_db(e)),
    };

    incidente_service::recalcular_totales(&mut tx, incidente_id).await?;
    let asignacion = find_by_id(&mut tx, id).await?.ok_or(AppError::InternalServerError)?;
    tx.commit().await.map_err(AppError::from_db)?;

    tracing::info!(
        "✅ Asignados {} min de {} a {} ({})",
        nueva.minutos,
        incidente_id,
        codigo.codigo,
        dinero::a_decimal(importe)
    );
    Ok(asignacion)
}

/// Cambia los minutos de una asignación; el importe se recalcula con la tarifa congelada.
pub async fn actualizar(pool: &SqlitePool, asignacion_id: i64, minutos: i64) -> AppResult<AsignacionCodigo> {
    validar_minutos(minutos)?;

    let mut tx = pool.begin().await?;
    let actual = find_by_id(&mut tx, asignacion_id)
        .await?
        .ok_or_else(|| AppError::not_found("Asignacion", asignacion_id))?;
    let incidente = incidente_service::find_by_id(&mut tx, &actual.incidente_id)
        .await?
        .ok_or_else(|| AppError::not_found("Incidente", &actual.incidente_id))?;
    exigir_modificable(&incidente)?;

    let asignados = incidente_service::minutos_asignados(&mut tx, &incidente.id).await? - actual.minutos;
    validar_tope(asignados, minutos, incidente.duracion_minutos)?;
    let importe = dinero::importe(minutos, actual.tarifa)?;

    sqlx::query("UPDATE asignaciones_codigo SET minutos = ?, importe = ? WHERE id = ?")
        .bind(minutos)
        .bind(importe)
        .bind(asignacion_id)
        .execute(&mut *tx)
        .await
        .map_err(AppError::from_db)?;

    incidente_service::recalcular_totales(&mut tx, &incidente.id).await?;
    let asignacion = find_by_id(&mut tx, asignacion_id)
        .await?
        .ok_or(AppError::InternalServerError)?;
    tx.commit().await.map_err(AppError::from_db)?;
    tracing::info!("Asignación {} actualizada a {} min.", asignacion_id, minutos);
    Ok(asignacion)
}

pub async fn eliminar(pool: &SqlitePool, asignacion_id: i64) -> AppResult<()> {
    let mut tx = pool.begin().await?;
    let actual = find_by_id(&mut tx, asignacion_id)
        .await?
        .ok_or_else(|| AppError::not_found("Asignacion", asignacion_id))?;
    let incidente = incidente_service::find_by_id(&mut tx, &actual.incidente_id)
        .await?
        .ok_or_else(|| AppError::not_found("Incidente", &actual.incidente_id))?;
    exigir_modificable(&incidente)?;

    sqlx::query("DELETE FROM asignaciones_codigo WHERE id = ?")
        .bind(asignacion_id)
        .execute(&mut *tx)
        .await
        .map_err(AppError::from_db)?;
    incidente_service::recalcular_totales(&mut tx, &incidente.id).await?;
    tx.commit().await.map_err(AppError::from_db)?;
    tracing::info!("Asignación {} eliminada.", asignacion_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::test_pool,
        models::{
            codigo::{ActualizarCodigo, Aplicabilidad},
            incidente::EstadoIncidente,
        },
        services::{
            codigo_service::tests::codigo,
            incidente_service::tests::{guardia_con_incidente, pasar_a},
        },
    };
    use rust_decimal::Decimal;

    async fn asignar_min(pool: &SqlitePool, incidente_id: &str, codigo_id: i64, minutos: i64) -> AppResult<AsignacionCodigo> {
        asignar(pool, incidente_id, NuevaAsignacion { codigo_id, minutos }).await
    }

    async fn totales(pool: &SqlitePool, id: &str) -> (i64, i64) {
        let inc = incidente_service::obtener(pool, id).await.unwrap().incidente;
        (inc.total_minutos, inc.total_importe)
    }

    #[tokio::test]
    async fn reparto_en_dos_codigos_actualiza_totales() {
        let pool = test_pool().await;
        let inc = guardia_con_incidente(&pool, "Sergio", "2025-03-08").await;
        let a = codigo(&pool, "CODE_A", 2, Aplicabilidad::Siempre).await;
        let b = codigo(&pool, "CODE_B", 3, Aplicabilidad::FeriadoOFinDeSemana).await;

        let asig_a = asignar_min(&pool, &inc.incidente.id, a.id, 90).await.unwrap();
        assert_eq!(asig_a.importe, 18_000);
        let asig_b = asignar_min(&pool, &inc.incidente.id, b.id, 60).await.unwrap();
        assert_eq!(asig_b.importe, 18_000);

        assert_eq!(totales(&pool, &inc.incidente.id).await, (150, 36_000));
    }

    #[tokio::test]
    async fn no_se_supera_la_duracion_del_incidente() {
        let pool = test_pool().await;
        let inc = guardia_con_incidente(&pool, "Sergio", "2025-03-08").await;
        let a = codigo(&pool, "CODE_A", 2, Aplicabilidad::Siempre).await;
        let b = codigo(&pool, "CODE_B", 3, Aplicabilidad::Siempre).await;
        let c = codigo(&pool, "CODE_C", 1, Aplicabilidad::Siempre).await;

        asignar_min(&pool, &inc.incidente.id, a.id, 90).await.unwrap();
        // 90 + 200 = 290 > 150
        let err = asignar_min(&pool, &inc.incidente.id, b.id, 200).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { ref campo, .. } if campo == "minutos"));
        assert_eq!(totales(&pool, &inc.incidente.id).await, (90, 18_000));

        // 90 + 60 = 150 cabe justo; luego no queda nada
        asignar_min(&pool, &inc.incidente.id, b.id, 60).await.unwrap();
        assert!(asignar_min(&pool, &inc.incidente.id, c.id, 1).await.is_err());
    }

    #[tokio::test]
    async fn minutos_no_positivos_codigo_inactivo_y_no_aplicable() {
        let pool = test_pool().await;
        // 2025-03-12 es miércoles
        let inc = guardia_con_incidente(&pool, "Ana", "2025-03-12").await;
        let a = codigo(&pool, "CODE_A", 2, Aplicabilidad::Siempre).await;
        let finde = codigo(&pool, "FINDE", 4, Aplicabilidad::FeriadoOFinDeSemana).await;

        assert!(matches!(asignar_min(&pool, &inc.incidente.id, a.id, 0).await, Err(AppError::Validation { .. })));
        assert!(matches!(asignar_min(&pool, &inc.incidente.id, finde.id, 10).await, Err(AppError::Validation { .. })));

        codigo_service::desactivar(&pool, a.id).await.unwrap();
        assert!(matches!(asignar_min(&pool, &inc.incidente.id, a.id, 10).await, Err(AppError::Validation { .. })));
    }

    #[tokio::test]
    async fn codigos_aplicables_segun_tipo_de_dia() {
        let pool = test_pool().await;
        let laborable = guardia_con_incidente(&pool, "Ana", "2025-03-12").await;
        let sabado = guardia_con_incidente(&pool, "Ana", "2025-03-08").await;
        codigo(&pool, "CODE_A", 2, Aplicabilidad::Siempre).await;
        codigo(&pool, "FINDE", 4, Aplicabilidad::FeriadoOFinDeSemana).await;
        codigo(&pool, "SEMANA", 1, Aplicabilidad::Laborable).await;

        let nombres = |v: Vec<CodigoFacturacion>| v.into_iter().map(|c| c.codigo).collect::<Vec<_>>();
        assert_eq!(
            nombres(codigos_aplicables(&pool, &laborable.incidente.id).await.unwrap()),
            vec!["CODE_A", "SEMANA"]
        );
        assert_eq!(
            nombres(codigos_aplicables(&pool, &sabado.incidente.id).await.unwrap()),
            vec!["CODE_A", "FINDE"]
        );
    }

    #[tokio::test]
    async fn el_importe_queda_congelado_ante_cambios_de_tarifa() {
        let pool = test_pool().await;
        let inc = guardia_con_incidente(&pool, "Sergio", "2025-03-08").await;
        let a = codigo(&pool, "CODE_A", 2, Aplicabilidad::Siempre).await;
        let asig = asignar_min(&pool, &inc.incidente.id, a.id, 90).await.unwrap();

        codigo_service::actualizar(
            &pool,
            a.id,
            ActualizarCodigo { tarifa: Some(Decimal::from(5)), ..Default::default() },
        )
        .await
        .unwrap();
        codigo_service::desactivar(&pool, a.id).await.unwrap();
        assert_eq!(totales(&pool, &inc.incidente.id).await, (90, 18_000));

        // Al cambiar minutos se usa la tarifa congelada (2,00), no la nueva
        let act = actualizar(&pool, asig.id, 100).await.unwrap();
        assert_eq!(act.importe, 20_000);
        assert_eq!(totales(&pool, &inc.incidente.id).await, (100, 20_000));
    }

    #[tokio::test]
    async fn eliminar_recalcula_y_codigo_en_uso_no_se_borra() {
        let pool = test_pool().await;
        let inc = guardia_con_incidente(&pool, "Sergio", "2025-03-08").await;
        let a = codigo(&pool, "CODE_A", 2, Aplicabilidad::Siempre).await;
        let asig = asignar_min(&pool, &inc.incidente.id, a.id, 30).await.unwrap();

        assert!(matches!(codigo_service::eliminar(&pool, a.id).await, Err(AppError::Conflict(_))));

        eliminar(&pool, asig.id).await.unwrap();
        assert_eq!(totales(&pool, &inc.incidente.id).await, (0, 0));
    }

    #[tokio::test]
    async fn incidente_rechazado_no_admite_asignaciones() {
        let pool = test_pool().await;
        let inc = guardia_con_incidente(&pool, "Sergio", "2025-03-08").await;
        let a = codigo(&pool, "CODE_A", 2, Aplicabilidad::Siempre).await;
        pasar_a(&pool, &inc.incidente.id, EstadoIncidente::Rechazado).await.unwrap();

        assert!(matches!(asignar_min(&pool, &inc.incidente.id, a.id, 10).await, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn mismo_codigo_dos_veces_es_invalido() {
        let pool = test_pool().await;
        let inc = guardia_con_incidente(&pool, "Sergio", "2025-03-08").await;
        let a = codigo(&pool, "CODE_A", 2, Aplicabilidad::Siempre).await;
        asignar_min(&pool, &inc.incidente.id, a.id, 10).await.unwrap();
        assert!(matches!(asignar_min(&pool, &inc.incidente.id, a.id, 10).await, Err(AppError::Validation { .. })));
    }
}
