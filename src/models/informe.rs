// src/models/informe.rs
use super::{
    guardia::Guardia,
    incidente::IncidenteConGuardia,
    liquidacion::{Liquidacion, Periodo},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Filtros comunes a todos los informes.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FiltrosInforme {
    pub desde: Option<NaiveDate>,
    pub hasta: Option<NaiveDate>,
    pub usuario: Option<String>,
    /// Estado de incidente o de liquidación, según el informe
    pub estado: Option<String>,
    pub codigo: Option<String>,
    pub periodo: Option<Periodo>,
    pub order_by: Option<String>,
    pub order_dir: Option<DireccionOrden>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DireccionOrden {
    #[default]
    Asc,
    Desc,
}

impl DireccionOrden {
    pub fn sql(self) -> &'static str {
        match self {
            DireccionOrden::Asc => "ASC",
            DireccionOrden::Desc => "DESC",
        }
    }
}

#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct CantidadImporte {
    pub cantidad: i64,
    #[serde(with = "crate::dinero::centimos")]
    pub importe: i64,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EstadisticasIncidentes {
    pub total_incidentes: i64,
    pub total_minutos: i64,
    #[serde(with = "crate::dinero::centimos")]
    pub total_importe: i64,
    pub por_estado: BTreeMap<String, i64>,
    pub por_usuario: BTreeMap<String, i64>,
    pub por_dia_semana: BTreeMap<String, i64>,
}

#[derive(Debug, Serialize)]
pub struct InformeIncidentes {
    pub incidentes: Vec<IncidenteConGuardia>,
    pub estadisticas: EstadisticasIncidentes,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardiaInforme {
    #[serde(flatten)]
    pub guardia: Guardia,
    pub tiene_incidentes: bool,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EstadisticasGuardias {
    pub total_guardias: i64,
    pub por_usuario: BTreeMap<String, i64>,
    pub por_dia_semana: BTreeMap<String, i64>,
    pub guardias_en_feriados: i64,
    pub guardias_en_fin_de_semana: i64,
    pub con_incidentes: i64,
    pub sin_incidentes: i64,
}

#[derive(Debug, Serialize)]
pub struct InformeGuardias {
    pub guardias: Vec<GuardiaInforme>,
    pub estadisticas: EstadisticasGuardias,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EstadisticasLiquidaciones {
    pub total_liquidaciones: i64,
    #[serde(with = "crate::dinero::centimos")]
    pub total_importe: i64,
    pub por_estado: BTreeMap<String, i64>,
    pub por_periodo: BTreeMap<String, CantidadImporte>,
}

#[derive(Debug, Serialize)]
pub struct InformeLiquidaciones {
    pub liquidaciones: Vec<Liquidacion>,
    pub estadisticas: EstadisticasLiquidaciones,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EstadisticasTiempo {
    pub tiempo_total_minutos: i64,
    pub promedio_duracion_minutos: f64,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InformeResumen {
    pub periodo: Option<Periodo>,
    pub total_guardias: i64,
    pub total_incidentes: i64,
    pub guardias_por_usuario: BTreeMap<String, i64>,
    pub incidentes_por_estado: BTreeMap<String, i64>,
    pub estadisticas_tiempo: EstadisticasTiempo,
}
