// src/dinero.rs
//! Importes monetarios.
//!
//! En la base de datos todo importe y toda tarifa se guardan como céntimos
//! enteros (`i64`). En la API se exponen como `Decimal` con dos decimales.

use crate::error::{AppError, AppResult};
use rust_decimal::prelude::*;

const DECIMALES: u32 = 2;

/// Importe máximo aceptado para una tarifa por minuto (10.000,00)
const TARIFA_MAXIMA: i64 = 1_000_000;

pub fn a_decimal(centimos: i64) -> Decimal {
    Decimal::new(centimos, DECIMALES)
}

/// Convierte un `Decimal` a céntimos sin redondear: más de dos decimales es un error.
pub fn a_centimos(valor: Decimal, campo: &str) -> AppResult<i64> {
    let escalado = valor
        .checked_mul(Decimal::ONE_HUNDRED)
        .ok_or_else(|| AppError::validation(campo, "importe fuera de rango"))?;
    if !escalado.fract().is_zero() {
        return Err(AppError::validation(campo, "admite como máximo dos decimales"));
    }
    escalado
        .to_i64()
        .ok_or_else(|| AppError::validation(campo, "importe fuera de rango"))
}

pub fn tarifa_desde_decimal(valor: Decimal) -> AppResult<i64> {
    let centimos = a_centimos(valor, "tarifa")?;
    if centimos < 0 {
        return Err(AppError::validation("tarifa", "no puede ser negativa"));
    }
    if centimos > TARIFA_MAXIMA {
        return Err(AppError::validation("tarifa", "excede la tarifa máxima por minuto"));
    }
    Ok(centimos)
}

/// importe = minutos × tarifa, en céntimos.
pub fn importe(minutos: i64, tarifa: i64) -> AppResult<i64> {
    minutos
        .checked_mul(tarifa)
        .ok_or_else(|| AppError::validation("minutos", "el importe resultante desborda"))
}

/// `#[serde(with = "crate::dinero::centimos")]` para campos en céntimos.
pub mod centimos {
    use super::*;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(valor: &i64, s: S) -> Result<S::Ok, S::Error> {
        serde::Serialize::serialize(&a_decimal(*valor), s)
    }
}
