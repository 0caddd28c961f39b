// src/models/liquidacion.rs
use crate::error::{AppError, AppResult};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum EstadoLiquidacion {
    Pendiente,
    Enviada,
    Procesada,
    Cerrada,
    /// Lote anulado: no cuenta como vigente y libera sus incidentes.
    Anulada,
}

impl EstadoLiquidacion {
    pub fn as_str(&self) -> &'static str {
        match self {
            EstadoLiquidacion::Pendiente => "pendiente",
            EstadoLiquidacion::Enviada => "enviada",
            EstadoLiquidacion::Procesada => "procesada",
            EstadoLiquidacion::Cerrada => "cerrada",
            EstadoLiquidacion::Anulada => "anulada",
        }
    }

    /// Único paso adelante permitido; sin saltos ni retrocesos.
    pub fn siguiente(self) -> Option<EstadoLiquidacion> {
        match self {
            EstadoLiquidacion::Pendiente => Some(EstadoLiquidacion::Enviada),
            EstadoLiquidacion::Enviada => Some(EstadoLiquidacion::Procesada),
            EstadoLiquidacion::Procesada => Some(EstadoLiquidacion::Cerrada),
            EstadoLiquidacion::Cerrada | EstadoLiquidacion::Anulada => None,
        }
    }

    pub fn puede_pasar_a(self, nuevo: EstadoLiquidacion) -> bool {
        self.siguiente() == Some(nuevo)
    }
}

impl fmt::Display for EstadoLiquidacion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Periodo de liquidación "YYYY-MM".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Periodo {
    pub anio: i32,
    pub mes: u32,
}

impl Periodo {
    pub fn primer_dia(&self) -> NaiveDate {
        // Validado en from_str
        NaiveDate::from_ymd_opt(self.anio, self.mes, 1).unwrap_or_default()
    }

    /// Primer día del mes siguiente (límite exclusivo).
    pub fn fin_exclusivo(&self) -> NaiveDate {
        let (anio, mes) = if self.mes == 12 { (self.anio + 1, 1) } else { (self.anio, self.mes + 1) };
        NaiveDate::from_ymd_opt(anio, mes, 1).unwrap_or_default()
    }

    pub fn de_fecha(fecha: NaiveDate) -> Self {
        Periodo { anio: fecha.year(), mes: fecha.month() }
    }
}

impl FromStr for Periodo {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        let invalido = || AppError::validation("periodo", format!("'{}' no tiene formato YYYY-MM", s));
        let (anio, mes) = s.trim().split_once('-').ok_or_else(invalido)?;
        if anio.len() != 4 || mes.len() != 2 {
            return Err(invalido());
        }
        let anio: i32 = anio.parse().map_err(|_| invalido())?;
        let mes: u32 = mes.parse().map_err(|_| invalido())?;
        if !(1..=12).contains(&mes) {
            return Err(invalido());
        }
        Ok(Periodo { anio, mes })
    }
}

impl fmt::Display for Periodo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.anio, self.mes)
    }
}

impl Serialize for Periodo {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Periodo {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Liquidacion {
    pub id: String, // UUID
    pub periodo: String,
    pub fecha_generacion: NaiveDateTime,
    pub estado: EstadoLiquidacion,
    pub observaciones: Option<String>,
    pub total_minutos: i64,
    #[serde(with = "crate::dinero::centimos")]
    pub total_importe: i64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetalleLiquidacion {
    pub id: i64,
    pub liquidacion_id: String,
    pub usuario: String,
    pub total_minutos: i64,
    #[serde(with = "crate::dinero::centimos")]
    pub total_importe: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidacionCompleta {
    #[serde(flatten)]
    pub liquidacion: Liquidacion,
    pub detalles: Vec<DetalleLiquidacion>,
    pub incidentes: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct GenerarLiquidacion {
    pub periodo: Periodo,
    #[serde(default)]
    pub observaciones: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CambioEstadoLiquidacion {
    pub nuevo_estado: EstadoLiquidacion,
}

#[derive(Debug, Default, Deserialize)]
pub struct FiltrosLiquidaciones {
    pub periodo: Option<Periodo>,
    pub estado: Option<EstadoLiquidacion>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use EstadoLiquidacion::*;

    #[test]
    fn solo_avanza_de_a_un_paso() {
        assert!(Pendiente.puede_pasar_a(Enviada));
        assert!(Enviada.puede_pasar_a(Procesada));
        assert!(Procesada.puede_pasar_a(Cerrada));

        assert!(!Pendiente.puede_pasar_a(Procesada));
        assert!(!Cerrada.puede_pasar_a(Pendiente));
        assert!(!Enviada.puede_pasar_a(Pendiente));
        assert!(!Pendiente.puede_pasar_a(Anulada));
        assert_eq!(Cerrada.siguiente(), None);
    }

    #[test]
    fn periodo_limites_y_formato() {
        let p: Periodo = "2025-03".parse().unwrap();
        assert_eq!(p.primer_dia(), NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
        assert_eq!(p.fin_exclusivo(), NaiveDate::from_ymd_opt(2025, 4, 1).unwrap());
        assert_eq!(p.to_string(), "2025-03");

        let diciembre: Periodo = "2024-12".parse().unwrap();
        assert_eq!(diciembre.fin_exclusivo(), NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());

        assert!("2025-13".parse::<Periodo>().is_err());
        assert!("2025-3".parse::<Periodo>().is_err());
        assert!("marzo".parse::<Periodo>().is_err());
    }
}
