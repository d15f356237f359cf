//! Session lookup for `Authorization: Bearer <token>` requests.
//!
//! A missing or unknown token is not an error by itself, since public
//! collections are readable anonymously. [`authorize`] decides per collection
//! and only consults the sessions table when the collection is not public.
use std::{convert::Infallible, str::FromStr};

use axum::{extract::FromRequestParts, http::request::Parts};
use protocol::Access;
use thiserror::Error;
use tracing::debug;

use crate::{database::Database, error::AppError, utils::bearer_token};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Role {
    #[default]
    Student,
    Instructor,
    Admin,
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Unknown role `{0}`")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Self::Student),
            "instructor" => Ok(Self::Instructor),
            "admin" => Ok(Self::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i64,
    pub name: String,
    pub role: Role,
}

/// The bearer token a request carried, not yet checked against any session.
#[derive(Debug, Clone, Default)]
pub struct Caller(pub Option<String>);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(bearer_token(&parts.headers).map(str::to_string)))
    }
}

/// Resolves the caller's session when `access` requires one and checks its
/// role. Public access never touches the database.
pub async fn authorize(
    database: &Database,
    caller: &Caller,
    access: Access,
) -> Result<Option<Principal>, AppError> {
    if access == Access::Public {
        return Ok(None);
    }

    let principal = match &caller.0 {
        Some(token) => {
            let principal = database.session_principal(token.clone()).await?;
            if principal.is_none() {
                debug!("Bearer token did not match a live session");
            }
            principal
        }
        None => None,
    };

    permit(principal.as_ref(), access)?;

    Ok(principal)
}

fn permit(principal: Option<&Principal>, access: Access) -> Result<(), AppError> {
    match (access, principal) {
        (Access::Public, _) => Ok(()),
        (_, None) => Err(AppError::Unauthenticated),
        (Access::Authenticated, Some(_)) => Ok(()),
        (Access::Admin, Some(principal)) if principal.role == Role::Admin => Ok(()),
        (Access::Admin, Some(_)) => Err(AppError::Forbidden),
    }
}
