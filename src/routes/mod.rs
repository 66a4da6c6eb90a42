//! Router Module Index
//!
//! Routes are split by access level so the auth gate is applied to a whole module
//! at once (see `create_router`).

/// Routes accessible without authentication.
pub mod public;

/// The user resource, behind the auth gate.
pub mod authenticated;
