//! Syntax highlighting through the Torchlight API.
//!
//! This crate does not tokenize anything itself. It sends code to a remote
//! highlighting service and takes care of everything around that call:
//!
//! - **Caching**: results are cached by content hash, so unchanged code is
//!   never sent twice and a fully cached page makes no requests at all.
//! - **Batching**: all uncached blocks go out in one request (or in
//!   concurrent chunks for very large batches).
//! - **Fallback**: anything the service does not answer is rendered locally
//!   as escaped plain text, so output is always usable.
//! - **Post-processing**: registered processors rewrite every block after
//!   highlighting, in order.
//!
//! # Error policy
//!
//! Outside production every failure (missing token, unreachable service,
//! error status, malformed response) is returned to the caller. In
//! production they are logged and swallowed, and affected blocks use the
//! local fallback. See [`ErrorPolicy`].
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use torchlight::{Block, Config, Manager};
//!
//! # fn main() -> torchlight::Result<()> {
//! let config = Config::default()
//!     .with_token("tl_...")
//!     .with_env_overrides();
//!
//! let mut manager = Manager::new(config)?;
//! manager.add_post_processor(|block: &mut Block| {
//!     if let Some(html) = &mut block.highlighted {
//!         *html = html.replace("TODO", "<mark>TODO</mark>");
//!     }
//! });
//!
//! let blocks = manager.highlight([
//!     Block::new("intro").language("rust").code("fn main() {}"),
//!     Block::new("setup").language("bash").code("cargo add torchlight"),
//! ])?;
//!
//! for block in &blocks {
//!     println!("{}", block.wrapped.as_deref().unwrap_or_default());
//! }
//! # Ok(())
//! # }
//! ```

mod block;
pub mod cache;
mod client;
mod config;
mod error;
mod manager;
mod policy;
pub mod render;
pub mod service;

pub use block::{Block, Rendered};
pub use cache::{CacheStore, FileCache, MemoryCache, NullCache};
pub use client::Client;
pub use config::{Config, DEFAULT_HOST, DEFAULT_THEME, PRODUCTION};
pub use error::{Error, RequestError, Result};
pub use manager::{Manager, PostProcessor, ProcessorRef};
pub use policy::ErrorPolicy;
pub use service::{HighlightService, HttpService};
