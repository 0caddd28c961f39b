// src/web/extract.rs
//! Extractores de entrada. Los rechazos de axum pasan a `AppError::Validation`
//! para que toda respuesta de error lleve el sobre JSON de la API.
use crate::error::AppError;
use axum::extract::{
    rejection::{JsonRejection, PathRejection, QueryRejection},
    FromRequest, FromRequestParts,
};

/// Cuerpo JSON de la petición.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct Cuerpo<T>(pub T);

/// Parámetros de la query string.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct Consulta<T>(pub T);

/// Segmentos de la ruta.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct Ruta<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rechazo: JsonRejection) -> Self {
        let texto = rechazo.body_text();
        AppError::validation(campo_en(&texto, "body"), texto)
    }
}

impl From<QueryRejection> for AppError {
    fn from(rechazo: QueryRejection) -> Self {
        let texto = rechazo.body_text();
        AppError::validation(campo_en(&texto, "query"), texto)
    }
}

impl From<PathRejection> for AppError {
    fn from(rechazo: PathRejection) -> Self {
        AppError::validation("path", rechazo.body_text())
    }
}

/// Saca el campo del texto de rechazo ("<prefijo>: <campo>: <motivo>"
/// o "missing field `campo`").
fn campo_en(texto: &str, defecto: &str) -> String {
    if texto.contains("missing field") {
        if let Some(campo) = texto.split('`').nth(1) {
            return campo.to_string();
        }
    }
    let partes: Vec<&str> = texto.splitn(3, ": ").collect();
    match partes.as_slice() {
        [_, campo, _] if !campo.is_empty() && *campo != "." && !campo.contains(' ') => campo.to_string(),
        _ => defecto.to_string(),
    }
}
