// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authgate - Authentication Gateway
//!
//! The single externally reachable entry point for a browser frontend and a
//! set of internal services. Terminates browser sessions, runs the OIDC
//! login flow against the identity provider, provisions local users on
//! first login, and relays authenticated requests to internal upstreams
//! with the verified identity attached.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Token verification, JWKS caching, and the code exchange
//! - `session` - Signed session cookies
//! - `users` - JIT-provisioned user directory (redb)
//! - `proxy` - Identity-injecting relay to internal services

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod proxy;
pub mod session;
pub mod state;
pub mod users;
