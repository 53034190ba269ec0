//! JWT-based authentication extractors for Axum handlers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use modelgen_core::error::CoreError;
use modelgen_core::types::OwnerId;
use modelgen_ledger::Account;

use crate::auth::jwt::{bearer_token, validate_token};
use crate::error::AppError;
use crate::state::AppState;

/// Owner extracted from the `Authorization` header.
///
/// The `Bearer ` prefix is optional; a bare token is accepted too.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub owner_id: OwnerId,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized(
                    "Missing Authorization header".into(),
                ))
            })?;

        let token = bearer_token(auth_header);
        if token.is_empty() {
            return Err(AppError::Core(CoreError::Unauthorized(
                "Empty bearer token".into(),
            )));
        }

        let claims = validate_token(token, &state.config.jwt).map_err(|_| {
            AppError::Core(CoreError::Unauthorized("Invalid or expired token".into()))
        })?;

        Ok(AuthUser {
            owner_id: claims.id,
        })
    }
}

/// An authenticated owner whose account exists and holds at least one
/// credit. Rejects with 401 for unknown owners and 402 for an empty balance.
#[derive(Debug, Clone, Copy)]
pub struct CreditedUser {
    pub account: Account,
}

impl FromRequestParts<AppState> for CreditedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;

        let account = state
            .accounts
            .lookup(user.owner_id)
            .await?
            .ok_or_else(|| AppError::Core(CoreError::Unauthorized("Unknown user".into())))?;

        if account.credit_balance < 1 {
            tracing::info!(owner_id = account.id, "Rejected request without credit");
            return Err(AppError::Core(CoreError::InsufficientCredit(format!(
                "balance is {}",
                account.credit_balance
            ))));
        }

        Ok(CreditedUser { account })
    }
}
