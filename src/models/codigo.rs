// src/models/codigo.rs
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Tipo de día en que un código es aplicable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Aplicabilidad {
    #[default]
    Siempre,
    FeriadoOFinDeSemana,
    Laborable,
}

impl Aplicabilidad {
    pub fn admite(self, es_feriado: bool, es_fin_de_semana: bool) -> bool {
        let dia_especial = es_feriado || es_fin_de_semana;
        match self {
            Aplicabilidad::Siempre => true,
            Aplicabilidad::FeriadoOFinDeSemana => dia_especial,
            Aplicabilidad::Laborable => !dia_especial,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodigoFacturacion {
    pub id: i64,
    pub codigo: String,
    pub descripcion: String,
    /// Céntimos por minuto
    #[serde(with = "crate::dinero::centimos")]
    pub tarifa: i64,
    pub activo: bool,
    pub aplicabilidad: Aplicabilidad,
}

#[derive(Debug, Deserialize)]
pub struct NuevoCodigo {
    pub codigo: String,
    pub descripcion: String,
    pub tarifa: Decimal,
    #[serde(default)]
    pub aplicabilidad: Aplicabilidad,
}

#[derive(Debug, Default, Deserialize)]
pub struct ActualizarCodigo {
    pub descripcion: Option<String>,
    pub tarifa: Option<Decimal>,
    pub activo: Option<bool>,
    pub aplicabilidad: Option<Aplicabilidad>,
}

/// Minutos de un incidente imputados a un código. `tarifa` e `importe`
/// se congelan en el momento de la asignación.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AsignacionCodigo {
    pub id: i64,
    pub incidente_id: String,
    pub codigo_id: i64,
    pub codigo: String,
    pub minutos: i64,
    #[serde(with = "crate::dinero::centimos")]
    pub tarifa: i64,
    #[serde(with = "crate::dinero::centimos")]
    pub importe: i64,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NuevaAsignacion {
    pub codigo_id: i64,
    pub minutos: i64,
}

#[derive(Debug, Deserialize)]
pub struct ActualizarAsignacion {
    pub minutos: i64,
}
