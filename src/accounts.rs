use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::RngCore;
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::error::{on_unique_violation, AppError, AppResult};

pub const MIN_PASSWORD_LEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Teacher => "teacher",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Role::Admin),
            "teacher" => Some(Role::Teacher),
            _ => None,
        }
    }

    /// Page a freshly logged-in user lands on.
    pub fn landing_path(self) -> &'static str {
        match self {
            Role::Admin => "/admin",
            Role::Teacher => "/docente",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(skip)]
    password_hash: String,
}

impl User {
    pub fn check_password(&self, password: &str) -> bool {
        verify_password(password, &self.password_hash)
    }
}

const USER_COLUMNS: &str = "id, name, email, role, password_hash";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let role: String = row.get(3)?;
    let role = Role::parse(&role).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown role {role:?}").into(),
        )
    })?;
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        role,
        password_hash: row.get(4)?,
    })
}

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let mut salt_bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| anyhow::anyhow!("invalid salt: {e}"))?;
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {e}"))?;
    Ok(hash.to_string())
}

/// A malformed stored hash verifies as false rather than erroring.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        tracing::warn!("stored password hash is not a valid PHC string");
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

pub fn create_user(
    conn: &Connection,
    name: &str,
    email: &str,
    password: &str,
    role: Role,
) -> AppResult<User> {
    let name = name.trim();
    let email = email.trim();
    if name.is_empty() || email.is_empty() {
        return Err(AppError::bad_params("Nombre y correo son obligatorios"));
    }
    if password.is_empty() {
        return Err(AppError::bad_params("La contraseña no puede estar vacía"));
    }
    if find_by_email(conn, email)?.is_some() {
        return Err(AppError::duplicate("El correo ya está registrado"));
    }

    let password_hash = hash_password(password)?;
    conn.execute(
        "INSERT INTO users(name, email, password_hash, role) VALUES(?, ?, ?, ?)",
        (name, email, &password_hash, role.as_str()),
    )
    .map_err(|e| on_unique_violation(e, "El correo ya está registrado"))?;

    Ok(User {
        id: conn.last_insert_rowid(),
        name: name.to_string(),
        email: email.to_string(),
        role,
        password_hash,
    })
}

pub fn find_by_id(conn: &Connection, id: i64) -> AppResult<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
    Ok(conn.query_row(&sql, [id], user_from_row).optional()?)
}

pub fn find_by_email(conn: &Connection, email: &str) -> AppResult<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?");
    Ok(conn.query_row(&sql, [email], user_from_row).optional()?)
}

/// Returns the user only when the email exists and the password verifies.
pub fn authenticate(conn: &Connection, email: &str, password: &str) -> AppResult<Option<User>> {
    let user = find_by_email(conn, email.trim())?;
    Ok(user.filter(|u| u.check_password(password)))
}

pub fn list_by_role(conn: &Connection, role: Role) -> AppResult<Vec<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE role = ? ORDER BY name, id");
    let mut stmt = conn.prepare(&sql)?;
    let users = stmt
        .query_map([role.as_str()], user_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

/// Checks run in order: current password, minimum length, confirmation.
pub fn change_password(
    conn: &Connection,
    user: &User,
    current: &str,
    new_password: &str,
    confirm: &str,
) -> AppResult<()> {
    if !user.check_password(current) {
        return Err(AppError::not_authorized(
            "La contraseña actual es incorrecta",
        ));
    }
    if new_password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::bad_params(format!(
            "La nueva contraseña debe tener al menos {MIN_PASSWORD_LEN} caracteres"
        )));
    }
    if new_password != confirm {
        return Err(AppError::bad_params("Las contraseñas no coinciden"));
    }

    let hash = hash_password(new_password)?;
    let updated = conn.execute(
        "UPDATE users SET password_hash = ? WHERE id = ?",
        (&hash, user.id),
    )?;
    if updated == 0 {
        return Err(AppError::not_found("usuario no encontrado"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_verifies_only_the_original_password() {
        let hash = hash_password("correct horse").expect("hash");
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
    }

    #[test]
    fn garbage_hash_never_verifies() {
        assert!(!verify_password("anything", "plain-text-password"));
    }

    #[test]
    fn role_strings_roundtrip() {
        for role in [Role::Admin, Role::Teacher] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("docente"), None);
    }
}
