// src/models/incidente.rs
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum EstadoIncidente {
    Registrado,
    Revisado,
    Aprobado,
    Rechazado,
    Liquidado,
}

impl EstadoIncidente {
    pub const TODOS: [EstadoIncidente; 5] = [
        EstadoIncidente::Registrado,
        EstadoIncidente::Revisado,
        EstadoIncidente::Aprobado,
        EstadoIncidente::Rechazado,
        EstadoIncidente::Liquidado,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EstadoIncidente::Registrado => "registrado",
            EstadoIncidente::Revisado => "revisado",
            EstadoIncidente::Aprobado => "aprobado",
            EstadoIncidente::Rechazado => "rechazado",
            EstadoIncidente::Liquidado => "liquidado",
        }
    }

    /// Transiciones permitidas por cambio de estado directo.
    /// `liquidado` sólo se alcanza al generar una liquidación.
    pub fn puede_pasar_a(self, nuevo: EstadoIncidente) -> bool {
        use EstadoIncidente::*;
        matches!(
            (self, nuevo),
            (Registrado, Revisado) | (Revisado, Aprobado) | (Registrado, Rechazado) | (Revisado, Rechazado)
        )
    }

    pub fn es_editable(self) -> bool {
        matches!(self, EstadoIncidente::Registrado | EstadoIncidente::Revisado)
    }

    /// Las asignaciones de códigos no se tocan en estados terminales.
    pub fn admite_asignaciones(self) -> bool {
        !matches!(self, EstadoIncidente::Liquidado | EstadoIncidente::Rechazado)
    }
}

impl fmt::Display for EstadoIncidente {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Incidente {
    pub id: String, // UUID
    pub guardia_id: String,
    pub inicio: NaiveDateTime,
    pub fin: NaiveDateTime,
    pub duracion_minutos: i64,
    pub descripcion: String,
    pub estado: EstadoIncidente,
    pub observaciones: Option<String>,
    pub total_minutos: i64,
    #[serde(with = "crate::dinero::centimos")]
    pub total_importe: i64,
    pub liquidacion_id: Option<String>,
    pub created_at: NaiveDateTime,
}

/// Incidente junto con los datos de su guardia (usuario y día).
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidenteConGuardia {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub incidente: Incidente,
    pub usuario: String,
    pub fecha: NaiveDate,
    pub es_feriado: bool,
    pub es_fin_de_semana: bool,
}

/// minutos(fin - inicio), o None si el intervalo es vacío o está invertido.
pub fn duracion_minutos(inicio: NaiveDateTime, fin: NaiveDateTime) -> Option<i64> {
    let minutos = (fin - inicio).num_minutes();
    (inicio < fin && minutos > 0).then_some(minutos)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NuevoIncidente {
    pub guardia_id: String,
    pub inicio: NaiveDateTime,
    pub fin: NaiveDateTime,
    pub descripcion: String,
    #[serde(default)]
    pub observaciones: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActualizarIncidente {
    pub inicio: Option<NaiveDateTime>,
    pub fin: Option<NaiveDateTime>,
    pub descripcion: Option<String>,
    pub observaciones: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CambioEstadoIncidente {
    pub nuevo_estado: EstadoIncidente,
    #[serde(default)]
    pub observaciones: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FiltrosIncidentes {
    pub guardia_id: Option<String>,
    pub estado: Option<EstadoIncidente>,
    pub usuario: Option<String>,
    pub desde: Option<NaiveDate>,
    pub hasta: Option<NaiveDate>,
}
