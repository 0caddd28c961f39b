// src/config.rs
use crate::error::{AppError, AppResult};
use chrono::NaiveDate;
use std::{collections::BTreeSet, env, net::SocketAddr, path::PathBuf};

/// Configuración leída del entorno (`main` carga antes el `.env` con dotenvy).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub db_max_connections: u32,
    pub session_ttl_horas: i64,
    pub feriados: BTreeSet<NaiveDate>,
    pub admin: Option<(String, String)>,
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        let database_url = env::var("DATABASE_URL")?;

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".into())
            .parse()
            .map_err(|_| AppError::validation("BIND_ADDR", "dirección inválida"))?;

        let db_max_connections = leer_numero("DB_MAX_CONNECTIONS", 5)?;
        let session_ttl_horas = leer_numero("SESSION_TTL_HORAS", 24)?;

        let mut feriados = BTreeSet::new();
        if let Ok(lista) = env::var("FERIADOS") {
            feriados.extend(parsear_feriados(&lista, ',')?);
        }
        if let Ok(ruta) = env::var("FERIADOS_PATH") {
            let ruta = PathBuf::from(ruta);
            let contenido = std::fs::read_to_string(&ruta).map_err(|e| {
                AppError::Upstream(format!("no se pudo leer {}: {}", ruta.display(), e))
            })?;
            feriados.extend(parsear_feriados(&contenido, '\n')?);
        }

        let admin = match (env::var("ADMIN_ID"), env::var("ADMIN_PASSWORD")) {
            (Ok(id), Ok(password)) if !id.is_empty() && !password.is_empty() => Some((id, password)),
            _ => None,
        };

        Ok(Config {
            database_url,
            bind_addr,
            db_max_connections,
            session_ttl_horas,
            feriados,
            admin,
        })
    }
}

fn leer_numero<T: std::str::FromStr>(var: &str, defecto: T) -> AppResult<T> {
    match env::var(var) {
        Ok(valor) => valor
            .trim()
            .parse()
            .map_err(|_| AppError::validation(var, "debe ser un número")),
        Err(_) => Ok(defecto),
    }
}

/// Lista de fechas `YYYY-MM-DD`; ignora líneas vacías y comentarios `#`.
pub fn parsear_feriados(texto: &str, separador: char) -> AppResult<Vec<NaiveDate>> {
    texto
        .split(separador)
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.starts_with('#'))
        .map(|s| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map_err(|_| AppError::validation("FERIADOS", format!("fecha inválida '{}'", s)))
        })
        .collect()
}
