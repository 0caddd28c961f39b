// src/services/calendario.rs
use crate::error::AppResult;
use chrono::NaiveDate;
use std::collections::BTreeSet;

/// Consulta de feriados. Un fallo de la fuente se devuelve como `AppError::Upstream`.
pub trait CalendarioFeriados: Send + Sync {
    fn es_feriado(&self, fecha: NaiveDate) -> AppResult<bool>;
}

/// Calendario fijo cargado de la configuración (`FERIADOS`, `FERIADOS_PATH`).
#[derive(Debug, Clone, Default)]
pub struct FeriadosFijos {
    fechas: BTreeSet<NaiveDate>,
}

impl FeriadosFijos {
    pub fn new(fechas: impl IntoIterator<Item = NaiveDate>) -> Self {
        FeriadosFijos {
            fechas: fechas.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.fechas.len()
    }
}

impl CalendarioFeriados for FeriadosFijos {
    fn es_feriado(&self, fecha: NaiveDate) -> AppResult<bool> {
        Ok(self.fechas.contains(&fecha))
    }
}
