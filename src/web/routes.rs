// src/web/routes.rs
use crate::{
    state::AppState,
    web::{
        auth_handlers, codigo_handlers, guardia_handlers, incidente_handlers, informe_handlers,
        liquidacion_handlers, mw_auth, mw_roles,
    },
};
use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

pub fn create_router(app_state: AppState) -> Router {
    // Capas por capacidad; se aplican a métodos concretos o a grupos enteros
    let revisar = middleware::from_fn_with_state(app_state.clone(), mw_roles::require_revisar);
    let admin = middleware::from_fn_with_state(app_state.clone(), mw_roles::require_admin);

    // --- Rutas públicas ---
    let public_routes = Router::new()
        .route("/login", post(auth_handlers::handle_login))
        .route("/logout", post(auth_handlers::handle_logout));

    let guardia_routes = Router::new()
        .route("/", get(guardia_handlers::listar).post(guardia_handlers::crear))
        .route("/importar", post(guardia_handlers::importar).route_layer(admin.clone()))
        .route(
            "/{id}",
            get(guardia_handlers::obtener)
                .put(guardia_handlers::actualizar)
                .merge(delete(guardia_handlers::eliminar).route_layer(admin.clone())),
        )
        .route("/{id}/incidentes", get(guardia_handlers::incidentes));

    let incidente_routes = Router::new()
        .route("/", get(incidente_handlers::listar).post(incidente_handlers::crear))
        .route(
            "/{id}",
            get(incidente_handlers::obtener)
                .put(incidente_handlers::actualizar)
                .merge(delete(incidente_handlers::eliminar).route_layer(admin.clone())),
        )
        .route("/{id}/estado", post(incidente_handlers::cambiar_estado).route_layer(revisar.clone()))
        .route(
            "/{id}/asignaciones",
            get(incidente_handlers::listar_asignaciones)
                .merge(post(incidente_handlers::asignar).route_layer(revisar.clone())),
        )
        .route("/{id}/codigos-aplicables", get(incidente_handlers::codigos_aplicables));

    let asignacion_routes = Router::new()
        .route(
            "/{id}",
            put(incidente_handlers::actualizar_asignacion).delete(incidente_handlers::eliminar_asignacion),
        )
        .route_layer(revisar.clone());

    let codigo_routes = Router::new()
        .route(
            "/",
            get(codigo_handlers::listar).merge(post(codigo_handlers::crear).route_layer(admin.clone())),
        )
        .route(
            "/{id}",
            put(codigo_handlers::actualizar)
                .delete(codigo_handlers::eliminar)
                .route_layer(admin.clone()),
        )
        .route("/{id}/desactivar", post(codigo_handlers::desactivar).route_layer(admin.clone()));

    let liquidacion_routes = Router::new()
        .route("/", get(liquidacion_handlers::listar))
        .route("/{id}", get(liquidacion_handlers::obtener))
        .route("/generar", post(liquidacion_handlers::generar).route_layer(admin.clone()))
        .route("/{id}/estado", post(liquidacion_handlers::cambiar_estado).route_layer(admin.clone()))
        .route("/{id}/anular", post(liquidacion_handlers::anular).route_layer(admin));

    let informe_routes = Router::new()
        .route("/incidentes", get(informe_handlers::incidentes))
        .route("/guardias", get(informe_handlers::guardias))
        .route("/liquidaciones", get(informe_handlers::liquidaciones))
        .route("/resumen", get(informe_handlers::resumen))
        .route("/{tipo}/exportar", get(informe_handlers::exportar))
        .route_layer(revisar);

    // Registrar por debajo de las capas más estrictas de cada grupo
    let registradas = Router::new()
        .nest("/guardias", guardia_routes)
        .nest("/incidentes", incidente_routes)
        .nest("/asignaciones", asignacion_routes)
        .nest("/codigos", codigo_routes)
        .nest("/liquidaciones", liquidacion_routes)
        .nest("/informes", informe_routes)
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            mw_roles::require_registrar,
        ));

    // --- Rutas autenticadas ---
    // require_auth va por fuera: deja el UserId que leen las capas de rol
    let api_routes = Router::new()
        .route("/me", get(auth_handlers::handle_me))
        .merge(registradas)
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            mw_auth::require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .nest("/api", api_routes)
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::test_pool,
        models::user::Rol,
        services::{calendario::FeriadosFijos, user_service},
    };
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        response::Response,
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;
    use tower_sessions::SessionManagerLayer;
    use tower_sessions_sqlx_store::SqliteStore;

    async fn app() -> Router {
        let pool = test_pool().await;
        user_service::create_user(&pool, "admin", "Admin", "clave", &[Rol::Admin])
            .await
            .unwrap();
        user_service::create_user(&pool, "op", "Operador", "clave", &[Rol::Operador])
            .await
            .unwrap();
        // Sólo un rol fuera del conjunto cerrado
        user_service::create_user(&pool, "sinrol", "Sin rol", "clave", &[])
            .await
            .unwrap();
        sqlx::query("INSERT INTO user_roles (user_id, role) VALUES ('sinrol', 'sysadmin')")
            .execute(&pool)
            .await
            .unwrap();

        let store = SqliteStore::new(pool.clone());
        store.migrate().await.unwrap();
        let state = AppState {
            db_pool: pool,
            calendario: Arc::new(FeriadosFijos::default()),
        };
        create_router(state).layer(SessionManagerLayer::new(store).with_secure(false))
    }

    fn peticion(metodo: &str, uri: &str, cookie: Option<&str>, cuerpo: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(metodo).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        match cuerpo {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn json_de(resp: Response) -> Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn login(app: &Router, usuario: &str) -> String {
        let resp = app
            .clone()
            .oneshot(peticion(
                "POST",
                "/login",
                None,
                Some(json!({ "username": usuario, "password": "clave" })),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let cookie = resp.headers()[header::SET_COOKIE].to_str().unwrap();
        cookie.split(';').next().unwrap().to_string()
    }

    #[tokio::test]
    async fn sin_sesion_responde_401_en_json() {
        let app = app().await;
        let resp = app.oneshot(peticion("GET", "/api/guardias", None, None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let json = json_de(resp).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Unauthorized");
    }

    #[tokio::test]
    async fn login_con_clave_erronea() {
        let app = app().await;
        let resp = app
            .oneshot(peticion(
                "POST",
                "/login",
                None,
                Some(json!({ "username": "op", "password": "mala" })),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn operador_registra_pero_no_administra() {
        let app = app().await;
        let cookie = login(&app, "op").await;

        let resp = app.clone().oneshot(peticion("GET", "/api/me", Some(&cookie), None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_de(resp).await["data"]["roles"], json!(["operador"]));

        let resp = app
            .clone()
            .oneshot(peticion(
                "POST",
                "/api/guardias",
                Some(&cookie),
                Some(json!({ "usuario": "Sergio", "fecha": "2025-03-08" })),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let guardia = json_de(resp).await;
        assert_eq!(guardia["data"]["esFinDeSemana"], true);

        let resp = app
            .clone()
            .oneshot(peticion(
                "POST",
                "/api/codigos",
                Some(&cookie),
                Some(json!({ "codigo": "CODE_A", "descripcion": "A", "tarifa": "2.00" })),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let resp = app
            .oneshot(peticion("GET", "/api/informes/resumen", Some(&cookie), None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn errores_de_dominio_llevan_su_clase() {
        let app = app().await;
        let cookie = login(&app, "admin").await;

        let nueva = json!({ "usuario": "Sergio", "fecha": "2025-03-08" });
        let resp = app
            .clone()
            .oneshot(peticion("POST", "/api/guardias", Some(&cookie), Some(nueva.clone())))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let resp = app
            .clone()
            .oneshot(peticion("POST", "/api/guardias", Some(&cookie), Some(nueva)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        assert_eq!(json_de(resp).await["error"], "DuplicateShiftError");

        let resp = app
            .clone()
            .oneshot(peticion(
                "POST",
                "/api/liquidaciones/generar",
                Some(&cookie),
                Some(json!({ "periodo": "2025-03" })),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_de(resp).await["error"], "ValidationError");

        let resp = app
            .oneshot(peticion("GET", "/api/informes/guardias/exportar?formato=pdf", Some(&cookie), None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn usuario_sin_roles_reconocidos_no_registra() {
        let app = app().await;
        let cookie = login(&app, "sinrol").await;

        let resp = app.clone().oneshot(peticion("GET", "/api/me", Some(&cookie), None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_de(resp).await["data"]["roles"], json!([]));

        let resp = app
            .clone()
            .oneshot(peticion(
                "POST",
                "/api/guardias",
                Some(&cookie),
                Some(json!({ "usuario": "Sergio", "fecha": "2025-03-08" })),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let resp = app
            .oneshot(peticion("GET", "/api/incidentes", Some(&cookie), None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(json_de(resp).await["error"], "Forbidden");
    }

    #[tokio::test]
    async fn entrada_mal_formada_es_error_de_validacion_en_json() {
        let app = app().await;
        let cookie = login(&app, "admin").await;

        let resp = app
            .clone()
            .oneshot(peticion(
                "POST",
                "/api/liquidaciones/generar",
                Some(&cookie),
                Some(json!({ "periodo": "2025-13" })),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(resp.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("application/json"));
        let json = json_de(resp).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "ValidationError");
        assert!(json["message"].as_str().unwrap().contains("periodo"));

        let resp = app
            .clone()
            .oneshot(peticion("POST", "/api/guardias", Some(&cookie), Some(json!({ "usuario": "Sergio" }))))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(json_de(resp).await["message"].as_str().unwrap().contains("fecha"));

        let resp = app
            .oneshot(peticion("GET", "/api/informes/resumen?desde=ayer", Some(&cookie), None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_de(resp).await["error"], "ValidationError");
    }

    #[tokio::test]
    async fn exportacion_csv_como_adjunto() {
        let app = app().await;
        let cookie = login(&app, "admin").await;
        let resp = app
            .oneshot(peticion(
                "GET",
                "/api/informes/resumen/exportar?formato=csv&periodo=2025-03",
                Some(&cookie),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers()[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/csv"));
        assert!(resp.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .contains("informe_resumen.csv"));
    }
}
