// src/models/user.rs
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{fmt, str::FromStr};

// Usuario leído de la tabla 'users'
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: String,
    pub password_hash: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(rename = "username")]
    pub id: String,
    pub password: String,
}

/// Conjunto cerrado de roles. Se comparan por igualdad exacta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rol {
    Operador,
    Supervisor,
    Admin,
}

impl Rol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rol::Operador => "operador",
            Rol::Supervisor => "supervisor",
            Rol::Admin => "admin",
        }
    }

    pub fn permite(self, capacidad: Capacidad) -> bool {
        match capacidad {
            Capacidad::Registrar => true,
            Capacidad::Revisar => matches!(self, Rol::Supervisor | Rol::Admin),
            Capacidad::Administrar => self == Rol::Admin,
        }
    }
}

impl FromStr for Rol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "operador" => Ok(Rol::Operador),
            "supervisor" => Ok(Rol::Supervisor),
            "admin" => Ok(Rol::Admin),
            otro => Err(format!("rol desconocido '{}'", otro)),
        }
    }
}

impl fmt::Display for Rol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capacidad {
    /// Alta y edición de guardias e incidentes; lecturas.
    Registrar,
    /// Cambios de estado de incidentes, asignaciones e informes.
    Revisar,
    /// Catálogo de códigos, importación masiva, liquidaciones y borrados.
    Administrar,
}

#[derive(Debug, Serialize)]
pub struct UsuarioActual {
    pub id: String,
    pub name: String,
    pub roles: Vec<Rol>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_por_coincidencia_exacta() {
        assert_eq!("admin".parse::<Rol>(), Ok(Rol::Admin));
        // Nada de subcadenas ni mayúsculas
        assert!("sysadmin".parse::<Rol>().is_err());
        assert!("admin_lectura".parse::<Rol>().is_err());
        assert!("Admin".parse::<Rol>().is_err());
    }

    #[test]
    fn capacidades_por_rol() {
        assert!(Rol::Operador.permite(Capacidad::Registrar));
        assert!(!Rol::Operador.permite(Capacidad::Revisar));
        assert!(Rol::Supervisor.permite(Capacidad::Revisar));
        assert!(!Rol::Supervisor.permite(Capacidad::Administrar));
        assert!(Rol::Admin.permite(Capacidad::Administrar));
    }
}
