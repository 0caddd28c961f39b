// src/services/codigo_service.rs
use crate::{
    dinero,
    error::{AppError, AppResult},
    models::codigo::{ActualizarCodigo, CodigoFacturacion, NuevoCodigo},
};
use sqlx::{SqliteConnection, SqlitePool};

const SELECT_CODIGO: &str =
    "SELECT id, codigo, descripcion, tarifa, activo, aplicabilidad FROM codigos_facturacion";

pub async fn find_by_id(conn: &mut SqliteConnection, id: i64) -> AppResult<Option<CodigoFacturacion>> {
    let codigo = sqlx::query_as::<_, CodigoFacturacion>(&format!("{} WHERE id = ?", SELECT_CODIGO))
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(codigo)
}

pub async fn obtener(pool: &SqlitePool, id: i64) -> AppResult<CodigoFacturacion> {
    let mut conn = pool.acquire().await?;
    find_by_id(&mut conn, id)
        .await?
        .ok_or_else(|| AppError::not_found("CodigoFacturacion", id))
}

pub async fn listar(pool: &SqlitePool, solo_activos: bool) -> AppResult<Vec<CodigoFacturacion>> {
    let sql = if solo_activos {
        format!("{} WHERE activo = 1 ORDER BY codigo ASC", SELECT_CODIGO)
    } else {
        format!("{} ORDER BY codigo ASC", SELECT_CODIGO)
    };
    let codigos = sqlx::query_as::<_, CodigoFacturacion>(&sql).fetch_all(pool).await?;
    Ok(codigos)
}

pub async fn crear(pool: &SqlitePool, nuevo: NuevoCodigo) -> AppResult<CodigoFacturacion> {
    let codigo = nuevo.codigo.trim().to_uppercase();
    if codigo.is_empty() {
        return Err(AppError::validation("codigo", "no puede estar vacío"));
    }
    let tarifa = dinero::tarifa_desde_decimal(nuevo.tarifa)?;

    let resultado = sqlx::query_scalar::<_, i64>(
        "INSERT INTO codigos_facturacion (codigo, descripcion, tarifa, activo, aplicabilidad) \
         VALUES (?, ?, ?, 1, ?) RETURNING id",
    )
    .bind(&codigo)
    .bind(nuevo.descripcion.trim())
    .bind(tarifa)
    .bind(nuevo.aplicabilidad)
    .fetch_one(pool)
    .await;

    let id = match resultado {
        Ok(id) => id,
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            return Err(AppError::Conflict(format!("El código '{}' ya existe", codigo)));
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!("✅ Código {} creado (tarifa {} /min)", codigo, dinero::a_decimal(tarifa));
    obtener(pool, id).await
}

/// Actualiza el catálogo. Un cambio de tarifa no afecta a importes ya asignados.
pub async fn actualizar(pool: &SqlitePool, id: i64, cambios: ActualizarCodigo) -> AppResult<CodigoFacturacion> {
    let actual = obtener(pool, id).await?;

    let tarifa = match cambios.tarifa {
        Some(t) => dinero::tarifa_desde_decimal(t)?,
        None => actual.tarifa,
    };
    let descripcion = cambios
        .descripcion
        .map(|d| d.trim().to_string())
        .unwrap_or(actual.descripcion);

    sqlx::query(
        "UPDATE codigos_facturacion SET descripcion = ?, tarifa = ?, activo = ?, aplicabilidad = ? WHERE id = ?",
    )
    .bind(&descripcion)
    .bind(tarifa)
    .bind(cambios.activo.unwrap_or(actual.activo))
    .bind(cambios.aplicabilidad.unwrap_or(actual.aplicabilidad))
    .bind(id)
    .execute(pool)
    .await
    .map_err(AppError::from_db)?;

    tracing::info!("Código {} actualizado.", actual.codigo);
    obtener(pool, id).await
}

/// Baja lógica: las asignaciones existentes conservan su importe.
pub async fn desactivar(pool: &SqlitePool, id: i64) -> AppResult<CodigoFacturacion> {
    let rows = sqlx::query("UPDATE codigos_facturacion SET activo = 0 WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .map_err(AppError::from_db)?
        .rows_affected();
    if rows == 0 {
        return Err(AppError::not_found("CodigoFacturacion", id));
    }
    tracing::info!("Código {} desactivado.", id);
    obtener(pool, id).await
}

/// Borrado físico, sólo si ninguna asignación lo usa.
pub async fn eliminar(pool: &SqlitePool, id: i64) -> AppResult<()> {
    let mut tx = pool.begin().await?;
    let usos: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM asignaciones_codigo WHERE codigo_id = ?")
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
    if usos > 0 {
        return Err(AppError::Conflict(format!(
            "El código tiene {} asignación(es); desactívelo en su lugar",
            usos
        )));
    }
    let rows = sqlx::query("DELETE FROM codigos_facturacion WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(AppError::from_db)?
        .rows_affected();
    if rows == 0 {
        return Err(AppError::not_found("CodigoFacturacion", id));
    }
    tx.commit().await.map_err(AppError::from_db)?;
    tracing::info!("Código {} eliminado.", id);
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{db::test_pool, models::codigo::Aplicabilidad};
    use rust_decimal::Decimal;

    pub(crate) async fn codigo(
        pool: &SqlitePool,
        codigo: &str,
        tarifa: i64,
        aplicabilidad: Aplicabilidad,
    ) -> CodigoFacturacion {
        crear(
            pool,
            NuevoCodigo {
                codigo: codigo.into(),
                descripcion: format!("Código {}", codigo),
                tarifa: Decimal::from(tarifa),
                aplicabilidad,
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn crea_en_mayusculas_y_rechaza_repetidos() {
        let pool = test_pool().await;
        let c = codigo(&pool, "code_a", 2, Aplicabilidad::Siempre).await;
        assert_eq!(c.codigo, "CODE_A");
        assert_eq!(c.tarifa, 200);
        assert!(c.activo);

        let repetido = NuevoCodigo {
            codigo: "CODE_A".into(),
            descripcion: "otra".into(),
            tarifa: Decimal::ONE,
            aplicabilidad: Aplicabilidad::Siempre,
        };
        assert!(matches!(crear(&pool, repetido).await, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn desactivar_es_baja_logica() {
        let pool = test_pool().await;
        let c = codigo(&pool, "CODE_A", 2, Aplicabilidad::Siempre).await;
        let d = desactivar(&pool, c.id).await.unwrap();
        assert!(!d.activo);
        assert_eq!(listar(&pool, true).await.unwrap().len(), 0);
        assert_eq!(listar(&pool, false).await.unwrap().len(), 1);

        let reactivado = actualizar(&pool, c.id, ActualizarCodigo { activo: Some(true), ..Default::default() })
            .await
            .unwrap();
        assert!(reactivado.activo);
    }

    #[tokio::test]
    async fn eliminar_codigo_sin_uso() {
        let pool = test_pool().await;
        let c = codigo(&pool, "CODE_A", 2, Aplicabilidad::Siempre).await;
        eliminar(&pool, c.id).await.unwrap();
        assert!(matches!(obtener(&pool, c.id).await, Err(AppError::NotFound { .. })));
    }
}
