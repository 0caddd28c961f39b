// src/models/mod.rs
pub mod codigo;
pub mod guardia;
pub mod incidente;
pub mod informe;
pub mod liquidacion;
pub mod user;
