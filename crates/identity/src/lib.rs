//! Caller identity for EduBridge.
//!
//! A phone number is looked up in the user directory and turned into a
//! `PersonaContext`. The OAuth token source issues bearer tokens for the
//! remote tool gateway.

pub mod directory;
pub mod oauth;
pub mod resolver;

pub use directory::{DirectoryUser, HttpDirectory, StaticDirectory, UserDirectory};
pub use oauth::{ClientCredentialsTokenSource, TokenSource};
pub use resolver::PersonaResolver;
