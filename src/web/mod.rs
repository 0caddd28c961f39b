// src/web/mod.rs
pub mod auth_handlers;
pub mod codigo_handlers;
pub mod extract;
pub mod guardia_handlers;
pub mod incidente_handlers;
pub mod informe_handlers;
pub mod liquidacion_handlers;
pub mod mw_auth;
pub mod mw_roles;
pub mod routes;
