//! Data models for the back-office auth API.
//!
//! This module contains the wire and domain types exchanged with the
//! remote authority:
//!
//! - `User`: profile of the signed-in account
//! - `Membership`, `Role`: the account's organization/office associations
//! - `Identity`: a user together with their memberships
//! - `LoginResponse`, `RefreshResponse`: token-bearing responses

pub mod auth;
pub mod membership;
pub mod user;

pub use auth::{Identity, LoginResponse, RefreshResponse};
pub use membership::{Membership, Role};
pub use user::User;
