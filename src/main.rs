// src/main.rs

// --- Módulos ---
mod config;
mod db;
mod dinero;
mod error;
mod models;
mod response;
mod services;
mod state;
mod web;

// --- Imports ---
use crate::{
    config::Config,
    services::{calendario::FeriadosFijos, user_service},
    state::AppState,
};
use axum::serve;
use std::{env, sync::Arc};
use time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tower_sessions::{ExpiredDeletion, Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::SqliteStore;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Logging ---
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            env::var("RUST_LOG")
                .unwrap_or_else(|_| "guardias=debug,tower_http=info,sqlx=warn,tower_sessions=info".into())
                .into()
        }))
        .with(fmt::layer())
        .init();

    tracing::info!("🚀 Iniciando servidor de guardias y liquidaciones...");

    let config = Config::from_env().map_err(|e| {
        tracing::error!("❌ Configuración inválida: {}", e);
        anyhow::anyhow!("Configuración inválida: {}", e)
    })?;

    // --- Base de datos ---
    let db_pool = match db::create_db_pool(&config).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("❌ Fallo crítico al inicializar la base de datos: {}", e);
            return Err(anyhow::anyhow!("Fallo al conectar/migrar la DB: {}", e));
        }
    };

    if let Some((admin_id, admin_password)) = &config.admin {
        if user_service::crear_admin_si_vacio(&db_pool, admin_id, admin_password)
            .await
            .map_err(|e| anyhow::anyhow!("No se pudo crear el administrador inicial: {}", e))?
        {
            tracing::info!("👤 Administrador inicial '{}' creado.", admin_id);
        }
    }

    // --- Sesiones ---
    let session_store = SqliteStore::new(db_pool.clone())
        .with_table_name("sessions")
        .map_err(|e| anyhow::anyhow!("Fallo al crear el session store: {}", e))?;
    session_store
        .migrate()
        .await
        .map_err(|e| anyhow::anyhow!("Fallo al migrar la tabla de sesiones: {}", e))?;

    let session_store_clone = session_store.clone();
    tokio::spawn(async move {
        if let Err(e) = session_store_clone
            .continuously_delete_expired(tokio::time::Duration::from_secs(60 * 60))
            .await
        {
            tracing::error!("Error en la limpieza de sesiones: {:?}", e);
        }
    });
    tracing::info!("🧹 Limpieza de sesiones iniciada.");

    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(false)
        .with_http_only(true)
        .with_expiry(Expiry::OnInactivity(Duration::hours(config.session_ttl_horas)));

    // --- Estado ---
    let calendario = FeriadosFijos::new(config.feriados.iter().copied());
    tracing::info!("📅 {} feriados cargados.", calendario.len());
    let app_state = AppState {
        db_pool,
        calendario: Arc::new(calendario),
    };

    let listener = match TcpListener::bind(config.bind_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("❌ No se pudo escuchar en {}: {}", config.bind_addr, e);
            return Err(e.into());
        }
    };
    tracing::info!("📡 Servidor escuchando en http://{}", config.bind_addr);

    let app = web::routes::create_router(app_state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(session_layer),
    );

    if let Err(e) = serve(listener, app.into_make_service()).await {
        tracing::error!("❌ Error fatal en el servidor: {}", e);
        return Err(e.into());
    }

    Ok(())
}
