//! # play-publisher
//!
//! Service account bootstrap and edit transactions for the Google Play
//! Developer API.
//!
//! ## Pipeline
//!
//! The flow is **resolve credential → build client → open edit → mutate →
//! commit (or not)**:
//!
//! 1. [`auth::resolve_credential`] picks a JSON key or a PKCS12 archive plus
//!    email and scopes the credential to the publishing scope.
//! 2. [`build_client`] wraps it in an authenticated [`api::PublisherClient`].
//! 3. [`EditSession::open_and_read`] / [`EditSession::open_and_write`] open a
//!    fresh edit, run the caller's block and commit only in the write variant.
//!
//! ## Example
//!
//! ```no_run
//! use play_publisher::{EditSession, build_client};
//! use play_publisher::types::{AccountConfig, Endpoints, PublishError};
//!
//! let client = build_client(&AccountConfig::json("play.json"), &Endpoints::default())?;
//! let session = EditSession::new(client, "com.example.app");
//!
//! let tracks = session.open_and_read(|edit| edit.api().list_tracks(edit.application_id(), edit.id()))?;
//! println!("{} tracks", tracks.len());
//! # Ok::<(), PublishError>(())
//! ```
//!
//! ## Modules
//!
//! - [`edit`]: edit sessions, the scoped [`Edit`] guard and error translation
//! - [`publisher`]: explicit construction from configuration

/// Edit sessions and open-error translation.
pub mod edit;

/// Client and session construction.
pub mod publisher;

/// Publishing API client.
/// Re-exported from play-publisher-api microcrate.
pub use play_publisher_api as api;

/// Credential resolution.
/// Re-exported from play-publisher-auth microcrate.
pub use play_publisher_auth as auth;

/// Configuration file handling.
/// Re-exported from play-publisher-config microcrate.
pub use play_publisher_config as config;

/// Domain types and errors.
/// Re-exported from play-publisher-types microcrate.
pub use play_publisher_types as types;

pub use edit::{Edit, EditSession};
pub use publisher::{build_client, session_from_config};
