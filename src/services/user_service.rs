// src/services/user_service.rs
use crate::{
    error::{AppError, AppResult},
    models::user::{Capacidad, Rol, User, UsuarioActual},
    services::auth_service,
};
use sqlx::SqlitePool;

pub async fn find_user_by_id(db_pool: &SqlitePool, user_id: &str) -> AppResult<Option<User>> {
    tracing::debug!("Buscando usuario por ID: {}", user_id);
    let user = sqlx::query_as::<_, User>("SELECT id, password_hash, name FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(db_pool)
        .await?;
    Ok(user)
}

/// Roles del usuario. Los valores fuera del conjunto cerrado se ignoran.
pub async fn get_user_roles(db_pool: &SqlitePool, user_id: &str) -> AppResult<Vec<Rol>> {
    let guardados: Vec<String> =
        sqlx::query_scalar("SELECT role FROM user_roles WHERE user_id = ? ORDER BY role ASC")
            .bind(user_id)
            .fetch_all(db_pool)
            .await?;

    let roles = guardados
        .iter()
        .filter_map(|r| match r.parse::<Rol>() {
            Ok(rol) => Some(rol),
            Err(e) => {
                tracing::warn!("Usuario '{}': {}", user_id, e);
                None
            }
        })
        .collect();
    Ok(roles)
}

pub async fn usuario_actual(db_pool: &SqlitePool, user_id: &str) -> AppResult<UsuarioActual> {
    let user = find_user_by_id(db_pool, user_id)
        .await?
        .ok_or(AppError::Unauthorized)?;
    let roles = get_user_roles(db_pool, user_id).await?;
    Ok(UsuarioActual {
        id: user.id,
        name: user.name,
        roles,
    })
}

pub async fn tiene_capacidad(db_pool: &SqlitePool, user_id: &str, capacidad: Capacidad) -> AppResult<bool> {
    let roles = get_user_roles(db_pool, user_id).await?;
    Ok(roles.iter().any(|r| r.permite(capacidad)))
}

pub async fn create_user(
    db_pool: &SqlitePool,
    id: &str,
    name: &str,
    raw_password: &str,
    roles: &[Rol],
) -> AppResult<()> {
    let id = id.trim();
    if id.is_empty() {
        return Err(AppError::validation("id", "no puede estar vacío"));
    }
    let password_hash = auth_service::hash_password(raw_password).await?;

    let mut tx = db_pool.begin().await?;
    let insertado = sqlx::query("INSERT INTO users (id, password_hash, name) VALUES (?, ?, ?)")
        .bind(id)
        .bind(&password_hash)
        .bind(name)
        .execute(&mut *tx)
        .await;
    match insertado {
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            tracing::warn!("No se creó el usuario: '{}' ya existe.", id);
            return Err(AppError::Conflict(format!("El usuario '{}' ya existe", id)));
        }
        r => {
            r.map_err(AppError::from_db)?;
        }
    }

    for rol in roles {
        sqlx::query("INSERT OR IGNORE INTO user_roles (user_id, role) VALUES (?, ?)")
            .bind(id)
            .bind(rol.as_str())
            .execute(&mut *tx)
            .await
            .map_err(AppError::from_db)?;
    }
    tx.commit().await.map_err(AppError::from_db)?;

    tracing::info!("✅ Usuario '{}' creado con roles {:?}", id, roles);
    Ok(())
}

/// Crea el administrador inicial si la tabla de usuarios está vacía.
pub async fn crear_admin_si_vacio(db_pool: &SqlitePool, id: &str, password: &str) -> AppResult<bool> {
    let usuarios: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(db_pool)
        .await?;
    if usuarios > 0 {
        return Ok(false);
    }
    create_user(db_pool, id, "Administrador", password, &[Rol::Admin]).await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[tokio::test]
    async fn roles_desconocidos_no_conceden_nada() {
        let pool = test_pool().await;
        create_user(&pool, "luis", "Luis", "x", &[Rol::Operador]).await.unwrap();
        // Un rol que contiene "admin" como subcadena no es admin
        sqlx::query("INSERT INTO user_roles (user_id, role) VALUES ('luis', 'sysadmin')")
            .execute(&pool)
            .await
            .unwrap();

        assert_eq!(get_user_roles(&pool, "luis").await.unwrap(), vec![Rol::Operador]);
        assert!(tiene_capacidad(&pool, "luis", Capacidad::Registrar).await.unwrap());
        assert!(!tiene_capacidad(&pool, "luis", Capacidad::Administrar).await.unwrap());
    }

    #[tokio::test]
    async fn admin_inicial_solo_con_tabla_vacia() {
        let pool = test_pool().await;
        assert!(crear_admin_si_vacio(&pool, "admin", "clave").await.unwrap());
        assert!(!crear_admin_si_vacio(&pool, "otro", "clave").await.unwrap());

        let actual = usuario_actual(&pool, "admin").await.unwrap();
        assert_eq!(actual.roles, vec![Rol::Admin]);
        assert!(matches!(usuario_actual(&pool, "otro").await, Err(AppError::Unauthorized)));
    }

    #[tokio::test]
    async fn usuario_repetido_es_conflicto() {
        let pool = test_pool().await;
        create_user(&pool, "ana", "Ana", "x", &[]).await.unwrap();
        assert!(matches!(
            create_user(&pool, "ana", "Ana", "y", &[]).await,
            Err(AppError::Conflict(_))
        ));
    }
}
