//! REST client module for the back-office authentication API.
//!
//! This module provides the `AuthGateway` trait and its HTTP
//! implementation for the four `/auth/*` endpoints: login, logout,
//! current identity and token refresh.
//!
//! Authenticated endpoints use JWT bearer tokens issued by the login
//! and refresh endpoints.

pub mod client;
pub mod error;

pub use client::{AuthGateway, HttpAuthGateway};
pub use error::{ApiError, ErrorKind};
