//! # Devv Keys
//!
//! The process-wide key directory for one shard. A [`KeyRing`] maps every
//! known address to its ECDSA keypair and classifies addresses into INN,
//! node, and wallet roles. It is built once at startup from password
//! protected PEM key files and is read-only afterwards, so it can be shared
//! across worker threads without locks.

pub mod errors;
pub mod keyfile;
pub mod ring;

pub use errors::{KeyError, KeyResult};
pub use keyfile::{parse_key_file, write_key_file, KeyFileEntry};
pub use ring::KeyRing;
