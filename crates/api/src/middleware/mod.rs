//! Request extractors for authentication and credit preconditions.
//!
//! - [`auth::AuthUser`] -- owner id from a JWT bearer token.
//! - [`auth::CreditedUser`] -- an authenticated owner with at least one credit.

pub mod auth;
