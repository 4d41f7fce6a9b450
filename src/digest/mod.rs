//! Request/response integrity stamping for legacy game clients.
//!
//! Fixed, unmodifiable binary clients across several hardware platforms each
//! stamp requests with a digest over path + secret (plus a version pair on
//! one platform), computed with one of two hash constructions. This module
//! works out which secret and construction a client used and signs responses
//! to match: [`compute`] is the digest function, [`detect`] resolves the
//! per-request client profile, [`keys`] holds the rotating secrets,
//! [`select`] maps a claimed digest back to a key, and [`middleware`] ties
//! it all into the request lifecycle.

pub mod compute;
pub mod detect;
pub mod keys;
pub mod middleware;
pub mod select;

pub use compute::{calculate_digest, AlgorithmFamily, VersionContext};
pub use detect::{detect_client_profile, ClientProfile};
pub use keys::KeyStore;
pub use middleware::stamp_digest;
pub use select::select_key;
