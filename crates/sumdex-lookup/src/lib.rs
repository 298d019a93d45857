//! Read-only lookups over sumdex stores.
//!
//! [`LocalLookup`] answers from one catalog, [`CentralLookup`] from the
//! central store across every namespace. Both support digest-prefix,
//! path-prefix and by-file (exact digest set) queries. An empty result is
//! not an error.

pub mod error;
pub mod hit;
pub mod service;

pub use error::{LookupError, LookupResult};
pub use hit::{CentralHit, LocalHit};
pub use service::{digest_candidates, CentralLookup, LocalLookup};
