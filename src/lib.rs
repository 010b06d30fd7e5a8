//! commonai - one interface for completions and multi-turn chats across
//! cloud and on-device language model providers.
//!
//! ```no_run
//! use commonai::{create_service, Config, Content};
//!
//! # async fn run() -> commonai::Result<()> {
//! let config = Config::load_or_default();
//! let service = create_service(&config)?;
//! let model = service.model(&config.model);
//!
//! let mut chat = model.start_chat(vec![Content::system("Be terse.")]);
//! let reply = chat.send(vec![Content::user("Hello.")]).await?;
//! println!("{}", reply.text);
//! # Ok(())
//! # }
//! ```

pub use commonai_core::*;

/// Re-exported so downstream crates can implement [`Model`], [`Chat`] and
/// [`Service`] without a direct dependency.
pub use async_trait::async_trait;
