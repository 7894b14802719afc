#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections

//! # Storefront Core
//!
//! Core of a small e-commerce storefront: the order lifecycle, an M-Pesa STK
//! push integration, and the asynchronous callback reconciliation that
//! finalizes paid orders.
//!
//! ## Overview
//!
//! The payment flow is the heart of the crate. A checkout sends one push
//! request to the gateway and records a `pending` payment attempt; the
//! gateway later posts an asynchronous callback, which reconciliation matches
//! to the pending attempt by correlation id and applies exactly once in
//! effect — stock decrement, paid transition, and the terminal payment write
//! happen in a single transaction, and redelivered callbacks are no-ops.
//!
//! Authentication, catalog administration, and notifications are external
//! collaborators; this crate reads products and accepts an explicit user id.
//!
//! ## Module Organization
//!
//! - [`models`] - SQLx data layer (orders, line items, tracking, payment attempts)
//! - [`state_machine`] - Explicit order and payment state machines
//! - [`mpesa`] - Gateway client, phone normalization, callback envelope
//! - [`services`] - Checkout and reconciliation transaction boundaries
//! - [`web`] - Axum handlers and router
//! - [`config`] - Environment-driven configuration
//! - [`error`] - Top-level error taxonomy
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use storefront_core::config::StorefrontConfig;
//! use storefront_core::web::{router, AppState};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = StorefrontConfig::from_env()?;
//! let state = AppState::from_config(config).await?;
//! let app = router(state);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod mpesa;
pub mod services;
pub mod state_machine;
pub mod web;

pub use error::{Result, StorefrontError};
