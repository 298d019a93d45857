//! Content digests for sumdex.
//!
//! Streams a file's bytes once through SHA-256 and returns the hex-encodable
//! [`Digest`](sumdex_types::Digest). The [`Digester`] trait is the seam the
//! scanner and merge engine hash through, so that callers can instrument it
//! (see [`CountingDigester`]).

pub mod error;
pub mod hasher;

pub use error::{DigestError, DigestResult};
pub use hasher::{CountingDigester, Digester, Sha256Digester};
