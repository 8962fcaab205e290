use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Admin,
    SuperAdmin,
}

impl Role {
    fn parse(raw: &str) -> Option<Role> {
        match raw.to_ascii_lowercase().as_str() {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            "superadmin" => Some(Role::SuperAdmin),
            _ => None,
        }
    }
}

/// Identity attached to each request by the upstream auth layer. Verification
/// happens there; these headers arrive pre-validated.
#[derive(Debug, Clone, Copy)]
pub struct Principal {
    pub user_id: i64,
    pub role: Role,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin | Role::SuperAdmin)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized(format!("missing {USER_ID_HEADER} header")))?
            .parse::<i64>()
            .map_err(|_| AppError::Unauthorized(format!("malformed {USER_ID_HEADER} header")))?;

        let role = match parts.headers.get(USER_ROLE_HEADER) {
            Some(raw) => raw
                .to_str()
                .ok()
                .and_then(Role::parse)
                .ok_or_else(|| {
                    AppError::Unauthorized(format!("malformed {USER_ROLE_HEADER} header"))
                })?,
            None => Role::User,
        };

        Ok(Principal { user_id, role })
    }
}
