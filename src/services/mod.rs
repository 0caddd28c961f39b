// src/services/mod.rs
pub mod asignacion_service;
pub mod auth_service;
pub mod calendario;
pub mod codigo_service;
pub mod exportacion;
pub mod guardia_service;
pub mod incidente_service;
pub mod informe_service;
pub mod liquidacion_service;
pub mod user_service;
