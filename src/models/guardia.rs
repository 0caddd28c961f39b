// src/models/guardia.rs
use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Guardia (turno de disponibilidad) de un usuario en un día.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Guardia {
    pub id: String, // UUID
    pub usuario: String,
    pub fecha: NaiveDate,
    pub es_feriado: bool,
    pub es_fin_de_semana: bool,
    pub notas: Option<String>,
    pub created_at: NaiveDateTime,
}

/// Sábado y domingo cuentan como fin de semana.
pub fn es_fin_de_semana(fecha: NaiveDate) -> bool {
    matches!(fecha.weekday(), Weekday::Sat | Weekday::Sun)
}

pub fn nombre_dia(fecha: NaiveDate) -> &'static str {
    match fecha.weekday() {
        Weekday::Mon => "lunes",
        Weekday::Tue => "martes",
        Weekday::Wed => "miércoles",
        Weekday::Thu => "jueves",
        Weekday::Fri => "viernes",
        Weekday::Sat => "sábado",
        Weekday::Sun => "domingo",
    }
}

#[derive(Debug, Deserialize)]
pub struct NuevaGuardia {
    pub usuario: String,
    pub fecha: String, // YYYY-MM-DD, validada en el servicio
    #[serde(default)]
    pub notas: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ActualizarGuardia {
    pub fecha: Option<String>,
    pub notas: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FiltrosGuardias {
    pub usuario: Option<String>,
    pub desde: Option<NaiveDate>,
    pub hasta: Option<NaiveDate>,
}

/// Resultado de la importación masiva: cada fila se confirma por separado.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultadoImportacion {
    pub creadas: Vec<Guardia>,
    pub fallidas: Vec<FilaFallida>,
}

#[derive(Debug, Serialize)]
pub struct FilaFallida {
    pub fila: usize,
    pub motivo: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clasifica_fin_de_semana() {
        let sabado = NaiveDate::from_ymd_opt(2025, 3, 8).unwrap();
        let lunes = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        assert!(es_fin_de_semana(sabado));
        assert!(!es_fin_de_semana(lunes));
        assert_eq!(nombre_dia(sabado), "sábado");
    }
}
