// src/services/informe_service.rs
//! Informes de sólo lectura sobre guardias, incidentes y liquidaciones.
use crate::{
    error::{AppError, AppResult},
    models::{
        guardia::{nombre_dia, Guardia},
        incidente::{EstadoIncidente, IncidenteConGuardia},
        informe::{
            CantidadImporte, EstadisticasGuardias, EstadisticasIncidentes, EstadisticasLiquidaciones,
            EstadisticasTiempo, FiltrosInforme, GuardiaInforme, InformeGuardias, InformeIncidentes,
            InformeLiquidaciones, InformeResumen,
        },
        liquidacion::{EstadoLiquidacion, Liquidacion, Periodo},
    },
    services::incidente_service::SELECT_INCIDENTE_CON_GUARDIA,
};
use futures_util::future::join_all;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::{collections::HashSet, time::Duration};

/// Máximo de parámetros por consulta `IN (...)`.
const TAM_LOTE_IDS: usize = 500;
/// Consultas simultáneas en el modo de respaldo.
const TAM_GRUPO_RESPALDO: usize = 5;
const PAUSA_ENTRE_GRUPOS: Duration = Duration::from_millis(20);

fn estado_incidente(valor: &str) -> AppResult<EstadoIncidente> {
    EstadoIncidente::TODOS
        .into_iter()
        .find(|e| e.as_str() == valor)
        .ok_or_else(|| AppError::validation("estado", format!("estado de incidente desconocido: '{}'", valor)))
}

fn estado_liquidacion(valor: &str) -> AppResult<EstadoLiquidacion> {
    [
        EstadoLiquidacion::Pendiente,
        EstadoLiquidacion::Enviada,
        EstadoLiquidacion::Procesada,
        EstadoLiquidacion::Cerrada,
        EstadoLiquidacion::Anulada,
    ]
    .into_iter()
    .find(|e| e.as_str() == valor)
    .ok_or_else(|| AppError::validation("estado", format!("estado de liquidación desconocido: '{}'", valor)))
}

/// Traduce `orderBy` a una columna de la lista blanca.
fn columna_orden(filtros: &FiltrosInforme, permitidas: &[(&str, &'static str)], defecto: &'static str) -> AppResult<String> {
    let columna = match filtros.order_by.as_deref() {
        None => defecto,
        Some(campo) => permitidas
            .iter()
            .find(|(nombre, _)| *nombre == campo)
            .map(|(_, columna)| *columna)
            .ok_or_else(|| AppError::validation("orderBy", format!("no se puede ordenar por '{}'", campo)))?,
    };
    Ok(format!(" ORDER BY {} {}", columna, filtros.order_dir.unwrap_or_default().sql()))
}

/// Rango de fechas de guardia: desde/hasta y, si viene, el periodo.
fn filtrar_fechas(qb: &mut QueryBuilder<'_, Sqlite>, columna: &str, filtros: &FiltrosInforme) {
    if let Some(desde) = filtros.desde {
        qb.push(format!(" AND {} >= ", columna)).push_bind(desde);
    }
    if let Some(hasta) = filtros.hasta {
        qb.push(format!(" AND {} <= ", columna)).push_bind(hasta);
    }
    if let Some(periodo) = filtros.periodo {
        qb.push(format!(" AND {} >= ", columna)).push_bind(periodo.primer_dia());
        qb.push(format!(" AND {} < ", columna)).push_bind(periodo.fin_exclusivo());
    }
}

pub async fn informe_incidentes(pool: &SqlitePool, filtros: &FiltrosInforme) -> AppResult<InformeIncidentes> {
    let orden = columna_orden(
        filtros,
        &[
            ("fecha", "g.fecha"),
            ("inicio", "i.inicio"),
            ("usuario", "g.usuario"),
            ("estado", "i.estado"),
            ("duracion", "i.duracion_minutos"),
            ("importe", "i.total_importe"),
        ],
        "i.inicio",
    )?;

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_INCIDENTE_CON_GUARDIA);
    qb.push(" WHERE 1 = 1");
    filtrar_fechas(&mut qb, "g.fecha", filtros);
    if let Some(usuario) = &filtros.usuario {
        qb.push(" AND g.usuario = ").push_bind(usuario.clone());
    }
    if let Some(estado) = &filtros.estado {
        qb.push(" AND i.estado = ").push_bind(estado_incidente(estado)?);
    }
    if let Some(codigo) = &filtros.codigo {
        qb.push(
            " AND EXISTS (SELECT 1 FROM asignaciones_codigo a \
             JOIN codigos_facturacion c ON c.id = a.codigo_id \
             WHERE a.incidente_id = i.id AND c.codigo = ",
        )
        .push_bind(codigo.trim().to_uppercase())
        .push(")");
    }
    qb.push(orden);

    let incidentes = qb.build_query_as::<IncidenteConGuardia>().fetch_all(pool).await?;
    let estadisticas = estadisticas_incidentes(&incidentes);
    tracing::debug!(
        "Informe de incidentes: {} filas, {} min",
        estadisticas.total_incidentes,
        estadisticas.total_minutos
    );
    Ok(InformeIncidentes {
        incidentes,
        estadisticas,
    })
}

fn estadisticas_incidentes(incidentes: &[IncidenteConGuardia]) -> EstadisticasIncidentes {
    let mut stats = EstadisticasIncidentes::default();
    for inc in incidentes {
        stats.total_incidentes += 1;
        stats.total_minutos += inc.incidente.total_minutos;
        stats.total_importe += inc.incidente.total_importe;
        *stats.por_estado.entry(inc.incidente.estado.to_string()).or_default() += 1;
        *stats.por_usuario.entry(inc.usuario.clone()).or_default() += 1;
        *stats.por_dia_semana.entry(nombre_dia(inc.fecha).to_string()).or_default() += 1;
    }
    stats
}

pub async fn informe_guardias(pool: &SqlitePool, filtros: &FiltrosInforme) -> AppResult<InformeGuardias> {
    let orden = columna_orden(filtros, &[("fecha", "fecha"), ("usuario", "usuario")], "fecha")?;

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT id, usuario, fecha, es_feriado, es_fin_de_semana, notas, created_at FROM guardias WHERE 1 = 1",
    );
    filtrar_fechas(&mut qb, "fecha", filtros);
    if let Some(usuario) = &filtros.usuario {
        qb.push(" AND usuario = ").push_bind(usuario.clone());
    }
    qb.push(orden);
    let guardias = qb.build_query_as::<Guardia>().fetch_all(pool).await?;

    let ids: Vec<&str> = guardias.iter().map(|g| g.id.as_str()).collect();
    let con_incidentes = match guardias_con_incidentes(pool, &ids).await {
        Ok(set) => set,
        Err(e) => {
            tracing::warn!("Consulta agrupada de incidentes falló ({}); usando consultas individuales", e);
            guardias_con_incidentes_por_grupos(pool, &ids).await?
        }
    };

    let guardias: Vec<GuardiaInforme> = guardias
        .into_iter()
        .map(|guardia| GuardiaInforme {
            tiene_incidentes: con_incidentes.contains(&guardia.id),
            guardia,
        })
        .collect();
    let estadisticas = estadisticas_guardias(&guardias);
    Ok(InformeGuardias {
        guardias,
        estadisticas,
    })
}

/// Una consulta por cada bloque de `TAM_LOTE_IDS` guardias.
async fn guardias_con_incidentes(pool: &SqlitePool, ids: &[&str]) -> AppResult<HashSet<String>> {
    let mut encontradas = HashSet::new();
    for bloque in ids.chunks(TAM_LOTE_IDS) {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT DISTINCT guardia_id FROM incidentes WHERE guardia_id IN (");
        let mut separados = qb.separated(", ");
        for id in bloque {
            separados.push_bind(*id);
        }
        separados.push_unseparated(")");
        let filas: Vec<String> = qb.build_query_scalar().fetch_all(pool).await?;
        encontradas.extend(filas);
    }
    Ok(encontradas)
}

/// Respaldo: grupos de consultas concurrentes con una pausa entre grupos.
async fn guardias_con_incidentes_por_grupos(pool: &SqlitePool, ids: &[&str]) -> AppResult<HashSet<String>> {
    let mut encontradas = HashSet::new();
    for (n, grupo) in ids.chunks(TAM_GRUPO_RESPALDO).enumerate() {
        if n > 0 {
            tokio::time::sleep(PAUSA_ENTRE_GRUPOS).await;
        }
        let consultas = grupo.iter().map(|id| async move {
            let existe: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM incidentes WHERE guardia_id = ?)")
                .bind(*id)
                .fetch_one(pool)
                .await?;
            Ok::<_, AppError>((*id, existe))
        });
        for resultado in join_all(consultas).await {
            let (id, existe) = resultado?;
            if existe {
                encontradas.insert(id.to_string());
            }
        }
    }
    Ok(encontradas)
}

fn estadisticas_guardias(guardias: &[GuardiaInforme]) -> EstadisticasGuardias {
    let mut stats = EstadisticasGuardias::default();
    for g in guardias {
        stats.total_guardias += 1;
        *stats.por_usuario.entry(g.guardia.usuario.clone()).or_default() += 1;
        *stats.por_dia_semana.entry(nombre_dia(g.guardia.fecha).to_string()).or_default() += 1;
        if g.guardia.es_feriado {
            stats.guardias_en_feriados += 1;
        }
        if g.guardia.es_fin_de_semana {
            stats.guardias_en_fin_de_semana += 1;
        }
        if g.tiene_incidentes {
            stats.con_incidentes += 1;
        } else {
            stats.sin_incidentes += 1;
        }
    }
    stats
}

pub async fn informe_liquidaciones(pool: &SqlitePool, filtros: &FiltrosInforme) -> AppResult<InformeLiquidaciones> {
    let orden = columna_orden(
        filtros,
        &[
            ("periodo", "periodo"),
            ("fecha", "fecha_generacion"),
            ("estado", "estado"),
            ("importe", "total_importe"),
        ],
        "periodo",
    )?;

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT id, periodo, fecha_generacion, estado, observaciones, total_minutos, total_importe \
         FROM liquidaciones l WHERE 1 = 1",
    );
    // desde/hasta acotan por periodo de la liquidación
    if let Some(desde) = filtros.desde {
        qb.push(" AND periodo >= ").push_bind(Periodo::de_fecha(desde).to_string());
    }
    if let Some(hasta) = filtros.hasta {
        qb.push(" AND periodo <= ").push_bind(Periodo::de_fecha(hasta).to_string());
    }
    if let Some(periodo) = filtros.periodo {
        qb.push(" AND periodo = ").push_bind(periodo.to_string());
    }
    if let Some(estado) = &filtros.estado {
        qb.push(" AND estado = ").push_bind(estado_liquidacion(estado)?);
    }
    if let Some(usuario) = &filtros.usuario {
        qb.push(" AND EXISTS (SELECT 1 FROM detalles_liquidacion d WHERE d.liquidacion_id = l.id AND d.usuario = ")
            .push_bind(usuario.clone())
            .push(")");
    }
    qb.push(orden);

    let liquidaciones = qb.build_query_as::<Liquidacion>().fetch_all(pool).await?;
    let estadisticas = estadisticas_liquidaciones(&liquidaciones);
    Ok(InformeLiquidaciones {
        liquidaciones,
        estadisticas,
    })
}

fn estadisticas_liquidaciones(liquidaciones: &[Liquidacion]) -> EstadisticasLiquidaciones {
    let mut stats = EstadisticasLiquidaciones::default();
    for l in liquidaciones {
        stats.total_liquidaciones += 1;
        *stats.por_estado.entry(l.estado.to_string()).or_default() += 1;
        // Un lote anulado se lista pero no suma importe
        if l.estado == EstadoLiquidacion::Anulada {
            continue;
        }
        stats.total_importe += l.total_importe;
        let periodo: &mut CantidadImporte = stats.por_periodo.entry(l.periodo.clone()).or_default();
        periodo.cantidad += 1;
        periodo.importe += l.total_importe;
    }
    stats
}

/// Resumen de actividad, opcionalmente acotado a un periodo y/o rango de fechas.
pub async fn informe_resumen(pool: &SqlitePool, filtros: &FiltrosInforme) -> AppResult<InformeResumen> {
    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT usuario, COUNT(*) FROM guardias WHERE 1 = 1");
    filtrar_fechas(&mut qb, "fecha", filtros);
    if let Some(usuario) = &filtros.usuario {
        qb.push(" AND usuario = ").push_bind(usuario.clone());
    }
    qb.push(" GROUP BY usuario");
    let guardias_por_usuario: Vec<(String, i64)> = qb.build_query_as().fetch_all(pool).await?;

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT i.estado, COUNT(*), COALESCE(SUM(i.duracion_minutos), 0) \
         FROM incidentes i JOIN guardias g ON g.id = i.guardia_id WHERE 1 = 1",
    );
    filtrar_fechas(&mut qb, "g.fecha", filtros);
    if let Some(usuario) = &filtros.usuario {
        qb.push(" AND g.usuario = ").push_bind(usuario.clone());
    }
    qb.push(" GROUP BY i.estado");
    let por_estado: Vec<(String, i64, i64)> = qb.build_query_as().fetch_all(pool).await?;

    let total_guardias = guardias_por_usuario.iter().map(|(_, n)| n).sum();
    let total_incidentes: i64 = por_estado.iter().map(|(_, n, _)| n).sum();
    let tiempo_total_minutos: i64 = por_estado.iter().map(|(_, _, m)| m).sum();
    let promedio_duracion_minutos = if total_incidentes > 0 {
        tiempo_total_minutos as f64 / total_incidentes as f64
    } else {
        0.0
    };

    Ok(InformeResumen {
        periodo: filtros.periodo,
        total_guardias,
        total_incidentes,
        guardias_por_usuario: guardias_por_usuario.into_iter().collect(),
        incidentes_por_estado: por_estado.into_iter().map(|(estado, n, _)| (estado, n)).collect(),
        estadisticas_tiempo: EstadisticasTiempo {
            tiempo_total_minutos,
            promedio_duracion_minutos,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::test_pool,
        models::{codigo::{Aplicabilidad, NuevaAsignacion}, liquidacion::GenerarLiquidacion},
        services::{
            asignacion_service,
            codigo_service::tests::codigo,
            guardia_service, liquidacion_service,
            incidente_service::tests::{guardia_con_incidente, pasar_a},
            calendario::FeriadosFijos,
        },
    };
    use crate::models::guardia::NuevaGuardia;

    async fn guardia_sin_incidentes(pool: &SqlitePool, usuario: &str, fecha: &str) -> Guardia {
        guardia_service::crear(
            pool,
            &FeriadosFijos::default(),
            NuevaGuardia { usuario: usuario.into(), fecha: fecha.into(), notas: None },
        )
        .await
        .unwrap()
    }

    fn marzo() -> FiltrosInforme {
        FiltrosInforme {
            periodo: Some("2025-03".parse().unwrap()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn informe_de_incidentes_con_estadisticas() {
        let pool = test_pool().await;
        let sergio = guardia_con_incidente(&pool, "Sergio", "2025-03-08").await;
        guardia_con_incidente(&pool, "Ana", "2025-03-10").await;
        guardia_con_incidente(&pool, "Ana", "2025-04-02").await;
        let a = codigo(&pool, "CODE_A", 2, Aplicabilidad::Siempre).await;
        asignacion_service::asignar(&pool, &sergio.incidente.id, NuevaAsignacion { codigo_id: a.id, minutos: 90 })
            .await
            .unwrap();

        let informe = informe_incidentes(&pool, &marzo()).await.unwrap();
        let e = &informe.estadisticas;
        assert_eq!(e.total_incidentes, 2);
        assert_eq!(e.total_minutos, 90);
        assert_eq!(e.total_importe, 18_000);
        assert_eq!(e.por_estado.get("registrado"), Some(&2));
        assert_eq!(e.por_usuario.get("Ana"), Some(&1));
        assert_eq!(e.por_dia_semana.get("sábado"), Some(&1));
        assert_eq!(e.por_dia_semana.get("lunes"), Some(&1));

        let por_codigo = FiltrosInforme { codigo: Some("code_a".into()), ..Default::default() };
        let informe = informe_incidentes(&pool, &por_codigo).await.unwrap();
        assert_eq!(informe.incidentes.len(), 1);
        assert_eq!(informe.incidentes[0].usuario, "Sergio");
    }

    #[tokio::test]
    async fn filtros_invalidos_son_de_validacion() {
        let pool = test_pool().await;
        let estado = FiltrosInforme { estado: Some("borrado".into()), ..Default::default() };
        assert!(matches!(informe_incidentes(&pool, &estado).await, Err(AppError::Validation { .. })));

        let orden = FiltrosInforme { order_by: Some("1; DROP TABLE guardias".into()), ..Default::default() };
        assert!(matches!(informe_guardias(&pool, &orden).await, Err(AppError::Validation { .. })));
    }

    #[tokio::test]
    async fn informe_de_guardias_marca_las_que_tienen_incidentes() {
        let pool = test_pool().await;
        guardia_con_incidente(&pool, "Sergio", "2025-03-08").await;
        guardia_sin_incidentes(&pool, "Sergio", "2025-03-09").await;
        guardia_sin_incidentes(&pool, "Ana", "2025-03-11").await;

        let informe = informe_guardias(&pool, &marzo()).await.unwrap();
        let e = &informe.estadisticas;
        assert_eq!(e.total_guardias, 3);
        assert_eq!(e.con_incidentes, 1);
        assert_eq!(e.sin_incidentes, 2);
        assert_eq!(e.guardias_en_fin_de_semana, 2);
        assert_eq!(e.guardias_en_feriados, 0);
        assert_eq!(e.por_usuario.get("Sergio"), Some(&2));
        assert!(informe.guardias[0].tiene_incidentes);
        assert!(!informe.guardias[1].tiene_incidentes);
    }

    #[tokio::test]
    async fn el_respaldo_por_grupos_coincide_con_la_consulta_agrupada() {
        let pool = test_pool().await;
        let mut ids = Vec::new();
        for dia in 1..=12 {
            let fecha = format!("2025-03-{:02}", dia);
            let id = if dia % 3 == 0 {
                guardia_con_incidente(&pool, "Sergio", &fecha).await.incidente.guardia_id
            } else {
                guardia_sin_incidentes(&pool, "Sergio", &fecha).await.id
            };
            ids.push(id);
        }
        let ids: Vec<&str> = ids.iter().map(String::as_str).collect();

        let agrupada = guardias_con_incidentes(&pool, &ids).await.unwrap();
        let por_grupos = guardias_con_incidentes_por_grupos(&pool, &ids).await.unwrap();
        assert_eq!(agrupada.len(), 4);
        assert_eq!(agrupada, por_grupos);
    }

    #[tokio::test]
    async fn informe_de_liquidaciones_por_periodo() {
        let pool = test_pool().await;
        let inc = guardia_con_incidente(&pool, "Sergio", "2025-03-08").await;
        let a = codigo(&pool, "CODE_A", 2, Aplicabilidad::Siempre).await;
        asignacion_service::asignar(&pool, &inc.incidente.id, NuevaAsignacion { codigo_id: a.id, minutos: 150 })
            .await
            .unwrap();
        pasar_a(&pool, &inc.incidente.id, EstadoIncidente::Revisado).await.unwrap();
        pasar_a(&pool, &inc.incidente.id, EstadoIncidente::Aprobado).await.unwrap();
        liquidacion_service::generar(
            &pool,
            GenerarLiquidacion { periodo: "2025-03".parse().unwrap(), observaciones: None },
        )
        .await
        .unwrap();

        let informe = informe_liquidaciones(&pool, &FiltrosInforme::default()).await.unwrap();
        let e = &informe.estadisticas;
        assert_eq!(e.total_liquidaciones, 1);
        assert_eq!(e.total_importe, 30_000);
        assert_eq!(e.por_estado.get("pendiente"), Some(&1));
        assert_eq!(e.por_periodo["2025-03"].cantidad, 1);
        assert_eq!(e.por_periodo["2025-03"].importe, 30_000);

        let de_ana = FiltrosInforme { usuario: Some("Ana".into()), ..Default::default() };
        assert!(informe_liquidaciones(&pool, &de_ana).await.unwrap().liquidaciones.is_empty());
    }

    #[tokio::test]
    async fn resumen_del_periodo() {
        let pool = test_pool().await;
        let inc = guardia_con_incidente(&pool, "Sergio", "2025-03-08").await;
        guardia_con_incidente(&pool, "Ana", "2025-03-10").await;
        guardia_sin_incidentes(&pool, "Ana", "2025-03-11").await;
        guardia_con_incidente(&pool, "Ana", "2025-05-01").await;
        pasar_a(&pool, &inc.incidente.id, EstadoIncidente::Revisado).await.unwrap();

        let resumen = informe_resumen(&pool, &marzo()).await.unwrap();
        assert_eq!(resumen.periodo.map(|p| p.to_string()).as_deref(), Some("2025-03"));
        assert_eq!(resumen.total_guardias, 3);
        assert_eq!(resumen.total_incidentes, 2);
        assert_eq!(resumen.guardias_por_usuario.get("Ana"), Some(&2));
        assert_eq!(resumen.incidentes_por_estado.get("revisado"), Some(&1));
        assert_eq!(resumen.estadisticas_tiempo.tiempo_total_minutos, 300);
        assert_eq!(resumen.estadisticas_tiempo.promedio_duracion_minutos, 150.0);

        let vacio = FiltrosInforme { periodo: Some("2024-01".parse().unwrap()), ..Default::default() };
        let resumen = informe_resumen(&pool, &vacio).await.unwrap();
        assert_eq!(resumen.total_incidentes, 0);
        assert_eq!(resumen.estadisticas_tiempo.promedio_duracion_minutos, 0.0);
    }
}
