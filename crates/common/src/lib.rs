//! Common utilities and shared types for aiponge.
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **ID Generation**: ULID identifiers and invitation tokens via [`IdGenerator`]
//!
//! # Example
//!
//! ```no_run
//! use aiponge_common::{AppResult, Config, IdGenerator};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let id_gen = IdGenerator::new();
//!     let token = id_gen.generate_invite_token(config.invitations.token_length);
//!     println!("Invitation token: {token}");
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod id;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use id::IdGenerator;
