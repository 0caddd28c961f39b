// src/services/exportacion.rs
use crate::{
    dinero,
    error::{AppError, AppResult},
    models::informe::FiltrosInforme,
    services::informe_service,
};
use serde::Deserialize;
use sqlx::SqlitePool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TipoInforme {
    Incidentes,
    Guardias,
    Liquidaciones,
    Resumen,
}

impl TipoInforme {
    fn as_str(&self) -> &'static str {
        match self {
            TipoInforme::Incidentes => "incidentes",
            TipoInforme::Guardias => "guardias",
            TipoInforme::Liquidaciones => "liquidaciones",
            TipoInforme::Resumen => "resumen",
        }
    }
}

/// Fichero listo para descargar.
#[derive(Debug)]
pub struct Exportacion {
    pub nombre_fichero: String,
    pub content_type: &'static str,
    pub contenido: Vec<u8>,
}

/// Sólo `csv` se genera aquí; `pdf` y `xlsx` corresponden al servicio de documentos.
pub async fn exportar(
    pool: &SqlitePool,
    tipo: TipoInforme,
    filtros: &FiltrosInforme,
    formato: &str,
) -> AppResult<Exportacion> {
    if !formato.eq_ignore_ascii_case("csv") {
        return Err(AppError::validation("formato", format!("formato no soportado: '{}'", formato)));
    }

    let filas = match tipo {
        TipoInforme::Incidentes => filas_incidentes(pool, filtros).await?,
        TipoInforme::Guardias => filas_guardias(pool, filtros).await?,
        TipoInforme::Liquidaciones => filas_liquidaciones(pool, filtros).await?,
        TipoInforme::Resumen => filas_resumen(pool, filtros).await?,
    };
    let contenido = escribir_csv(&filas)?;
    tracing::info!("Informe de {} exportado: {} filas", tipo.as_str(), filas.len().saturating_sub(1));

    Ok(Exportacion {
        nombre_fichero: format!("informe_{}.csv", tipo.as_str()),
        content_type: "text/csv; charset=utf-8",
        contenido,
    })
}

/// La primera fila es la cabecera.
fn escribir_csv(filas: &[Vec<String>]) -> AppResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for fila in filas {
        writer.write_record(fila).map_err(|e| {
            tracing::error!("Error escribiendo CSV: {}", e);
            AppError::InternalServerError
        })?;
    }
    writer.into_inner().map_err(|e| {
        tracing::error!("Error cerrando CSV: {}", e);
        AppError::InternalServerError
    })
}

fn cabecera(campos: &[&str]) -> Vec<String> {
    campos.iter().map(|c| c.to_string()).collect()
}

async fn filas_incidentes(pool: &SqlitePool, filtros: &FiltrosInforme) -> AppResult<Vec<Vec<String>>> {
    let informe = informe_service::informe_incidentes(pool, filtros).await?;
    let mut filas = vec![cabecera(&[
        "id", "usuario", "fecha", "inicio", "fin", "duracion_minutos", "estado", "total_minutos",
        "total_importe", "descripcion",
    ])];
    filas.extend(informe.incidentes.into_iter().map(|i| {
        vec![
            i.incidente.id,
            i.usuario,
            i.fecha.to_string(),
            i.incidente.inicio.to_string(),
            i.incidente.fin.to_string(),
            i.incidente.duracion_minutos.to_string(),
            i.incidente.estado.to_string(),
            i.incidente.total_minutos.to_string(),
            dinero::a_decimal(i.incidente.total_importe).to_string(),
            i.incidente.descripcion,
        ]
    }));
    Ok(filas)
}

async fn filas_guardias(pool: &SqlitePool, filtros: &FiltrosInforme) -> AppResult<Vec<Vec<String>>> {
    let informe = informe_service::informe_guardias(pool, filtros).await?;
    let mut filas = vec![cabecera(&[
        "id", "usuario", "fecha", "es_feriado", "es_fin_de_semana", "tiene_incidentes", "notas",
    ])];
    filas.extend(informe.guardias.into_iter().map(|g| {
        vec![
            g.guardia.id,
            g.guardia.usuario,
            g.guardia.fecha.to_string(),
            g.guardia.es_feriado.to_string(),
            g.guardia.es_fin_de_semana.to_string(),
            g.tiene_incidentes.to_string(),
            g.guardia.notas.unwrap_or_default(),
        ]
    }));
    Ok(filas)
}

async fn filas_liquidaciones(pool: &SqlitePool, filtros: &FiltrosInforme) -> AppResult<Vec<Vec<String>>> {
    let informe = informe_service::informe_liquidaciones(pool, filtros).await?;
    let mut filas = vec![cabecera(&[
        "id", "periodo", "fecha_generacion", "estado", "total_minutos", "total_importe",
    ])];
    filas.extend(informe.liquidaciones.into_iter().map(|l| {
        vec![
            l.id,
            l.periodo,
            l.fecha_generacion.to_string(),
            l.estado.to_string(),
            l.total_minutos.to_string(),
            dinero::a_decimal(l.total_importe).to_string(),
        ]
    }));
    Ok(filas)
}

/// El resumen se aplana a pares indicador/valor.
async fn filas_resumen(pool: &SqlitePool, filtros: &FiltrosInforme) -> AppResult<Vec<Vec<String>>> {
    let resumen = informe_service::informe_resumen(pool, filtros).await?;
    let mut filas = vec![
        cabecera(&["indicador", "valor"]),
        vec!["total_guardias".into(), resumen.total_guardias.to_string()],
        vec!["total_incidentes".into(), resumen.total_incidentes.to_string()],
        vec![
            "tiempo_total_minutos".into(),
            resumen.estadisticas_tiempo.tiempo_total_minutos.to_string(),
        ],
        vec![
            "promedio_duracion_minutos".into(),
            format!("{:.2}", resumen.estadisticas_tiempo.promedio_duracion_minutos),
        ],
    ];
    for (usuario, n) in resumen.guardias_por_usuario {
        filas.push(vec![format!("guardias_usuario:{}", usuario), n.to_string()]);
    }
    for (estado, n) in resumen.incidentes_por_estado {
        filas.push(vec![format!("incidentes_estado:{}", estado), n.to_string()]);
    }
    Ok(filas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db::test_pool, services::incidente_service::tests::guardia_con_incidente};

    #[tokio::test]
    async fn exporta_incidentes_en_csv() {
        let pool = test_pool().await;
        guardia_con_incidente(&pool, "Sergio", "2025-03-08").await;

        let exp = exportar(&pool, TipoInforme::Incidentes, &FiltrosInforme::default(), "csv")
            .await
            .unwrap();
        assert_eq!(exp.nombre_fichero, "informe_incidentes.csv");
        let texto = String::from_utf8(exp.contenido).unwrap();
        let lineas: Vec<&str> = texto.lines().collect();
        assert_eq!(lineas.len(), 2);
        assert!(lineas[0].starts_with("id,usuario,fecha"));
        assert!(lineas[1].contains("Sergio,2025-03-08"));
        assert!(lineas[1].contains("registrado"));
    }

    #[tokio::test]
    async fn resumen_como_pares() {
        let pool = test_pool().await;
        guardia_con_incidente(&pool, "Ana", "2025-03-10").await;
        let exp = exportar(&pool, TipoInforme::Resumen, &FiltrosInforme::default(), "CSV")
            .await
            .unwrap();
        let texto = String::from_utf8(exp.contenido).unwrap();
        assert!(texto.contains("total_guardias,1"));
        assert!(texto.contains("guardias_usuario:Ana,1"));
    }

    #[tokio::test]
    async fn pdf_y_xlsx_no_se_generan_aqui() {
        let pool = test_pool().await;
        for formato in ["pdf", "xlsx", "docx"] {
            let err = exportar(&pool, TipoInforme::Guardias, &FiltrosInforme::default(), formato)
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::Validation { ref campo, .. } if campo == "formato"));
        }
    }
}
