//! Services the web layer calls into: credential hashing, signup and
//! authentication, and the social graph (follows, likes, timelines).

pub mod accounts;
pub mod error;
pub mod hasher;
pub mod social;

pub use accounts::Accounts;
pub use error::{Error, Result};
pub use hasher::{Argon2Hasher, CredentialHasher};
pub use social::Social;
