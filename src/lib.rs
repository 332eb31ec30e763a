//! Verifiable Presentation Services
//!
//! Issues W3C verifiable presentations over a set of existing credentials.
//!
//! ## Services
//!
//! - **Generator**: keys, applications and the issuance pipeline
//! - **Renderer**: schema-checked template compilation
//! - **Registry**: storage and lookup of issued presentations
//! - **Template store**: templates, published as `did:web` documents
//!
//! One binary runs any of them, selected by `SERVICE`.

pub mod api;
pub mod config;
pub mod crypto;
pub mod did;
pub mod ejs;
pub mod error;
pub mod issuer;
pub mod proof;
pub mod render;
pub mod server;
pub mod state;
pub mod store;
pub mod types;

pub use config::{Config, Service};
pub use error::{ApiError, ApiResult};
