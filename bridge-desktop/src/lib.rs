//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! Desktop hosts get an [`HttpClient`](bridge_traits::HttpClient) backed by
//! `reqwest` for free. Audio output stays host-provided: every desktop shell
//! (Tauri, a native app, a headless test rig) picks its own sink and plugs it
//! in through [`AudioElementFactory`](bridge_traits::AudioElementFactory).
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::ReqwestHttpClient;
//! use std::sync::Arc;
//!
//! let http_client = Arc::new(ReqwestHttpClient::new()?);
//! let config = CoreConfig::builder()
//!     .http_client(http_client)
//!     .build()?;
//! ```

mod http;

pub use http::ReqwestHttpClient;
