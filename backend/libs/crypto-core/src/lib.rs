//! Cryptographic primitives shared by playback services
//!
//! - `playback_token`: HMAC-sealed, expiring grants for the license and stream proxies

pub mod playback_token;

pub use playback_token::{TokenError, TokenGrant, TokenSigner, MAX_TOKEN_LENGTH};
