// src/db.rs
use crate::{config::Config, error::AppResult};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

pub async fn create_db_pool(config: &Config) -> AppResult<SqlitePool> {
    tracing::info!("Conectando a la base de datos: {}", config.database_url);

    // Crear si no existe; esperar hasta 5 s ante bloqueos de escritura
    let options = SqliteConnectOptions::from_str(&config.database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect_with(options)
        .await?;

    tracing::info!("Ejecutando migraciones...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Migraciones completadas.");

    Ok(pool)
}

/// Pool en memoria con el esquema real, para los tests.
///
/// Una sola conexión: cada conexión `:memory:` tendría su propia base.
#[cfg(test)]
pub async fn test_pool() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}

/// Pool sobre un fichero temporal, con varias conexiones reales.
#[cfg(test)]
pub async fn file_pool(ruta: &std::path::Path) -> SqlitePool {
    let options = SqliteConnectOptions::new()
        .filename(ruta)
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));
    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}
