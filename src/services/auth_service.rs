// src/services/auth_service.rs
use crate::{
    error::{AppError, AppResult},
    models::user::{LoginForm, User},
    services::user_service,
};
use sqlx::SqlitePool;

// bcrypt con coste por defecto es muy lento sin optimizaciones
#[cfg(not(test))]
const COSTE_HASH: u32 = bcrypt::DEFAULT_COST;
#[cfg(test)]
const COSTE_HASH: u32 = 4;

/// Verifica si la contraseña corresponde al hash guardado.
pub async fn verify_password(password: &str, stored_hash: &str) -> AppResult<bool> {
    let password = password.to_string();
    let stored_hash = stored_hash.to_string();
    tokio::task::spawn_blocking(move || {
        tracing::debug!("Verificando hash bcrypt...");
        bcrypt::verify(&password, &stored_hash)
    })
    .await
    .map_err(|e| {
        tracing::error!("Error en spawn_blocking (verify_password): {:?}", e);
        AppError::InternalServerError
    })?
    .map_err(|e| {
        tracing::error!("Error bcrypt al verificar: {:?}", e);
        AppError::PasswordHashingError
    })
}

pub async fn hash_password(password: &str) -> AppResult<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(&password, COSTE_HASH))
        .await
        .map_err(|e| {
            tracing::error!("Error en spawn_blocking (hash_password): {:?}", e);
            AppError::InternalServerError
        })?
        .map_err(|e| {
            tracing::error!("Error bcrypt al generar hash: {:?}", e);
            AppError::PasswordHashingError
        })
}

/// Usuario inexistente y contraseña errónea dan el mismo error.
pub async fn autenticar(pool: &SqlitePool, form: &LoginForm) -> AppResult<User> {
    let Some(user) = user_service::find_user_by_id(pool, &form.id).await? else {
        tracing::warn!("Login: usuario '{}' no existe", form.id);
        return Err(AppError::InvalidCredentials);
    };
    if !verify_password(&form.password, &user.password_hash).await? {
        tracing::warn!("Login: contraseña incorrecta para '{}'", form.id);
        return Err(AppError::InvalidCredentials);
    }
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db::test_pool, models::user::Rol};

    fn form(id: &str, password: &str) -> LoginForm {
        LoginForm {
            id: id.into(),
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn login_correcto_e_incorrecto() {
        let pool = test_pool().await;
        user_service::create_user(&pool, "sergio", "Sergio", "s3creta", &[Rol::Operador])
            .await
            .unwrap();

        let user = autenticar(&pool, &form("sergio", "s3creta")).await.unwrap();
        assert_eq!(user.name, "Sergio");

        assert!(matches!(
            autenticar(&pool, &form("sergio", "otra")).await,
            Err(AppError::InvalidCredentials)
        ));
        assert!(matches!(
            autenticar(&pool, &form("nadie", "s3creta")).await,
            Err(AppError::InvalidCredentials)
        ));
    }
}
