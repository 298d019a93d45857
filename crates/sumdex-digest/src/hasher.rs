use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use sha2::{Digest as _, Sha256};
use sumdex_types::Digest;

use crate::error::{DigestError, DigestResult};

/// Computes the content digest of a file.
///
/// Implementations must be deterministic: the same bytes always produce the
/// same [`Digest`]. Any I/O failure aborts with an error; there is no partial
/// or resumable state.
pub trait Digester {
    /// Stream the full contents of `path` through the hash function.
    fn digest_file(&self, path: &Path) -> DigestResult<Digest>;
}

impl<D: Digester + ?Sized> Digester for &D {
    fn digest_file(&self, path: &Path) -> DigestResult<Digest> {
        (**self).digest_file(path)
    }
}

/// Streaming SHA-256 digester.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sha256Digester;

impl Sha256Digester {
    /// Hash an in-memory buffer.
    pub fn digest_bytes(data: &[u8]) -> Digest {
        Digest::from_hash(Sha256::digest(data).into())
    }

    /// Hash everything `reader` yields until EOF.
    pub fn digest_reader<R: Read>(reader: &mut R) -> io::Result<Digest> {
        let mut hasher = Sha256::new();
        io::copy(reader, &mut hasher)?;
        Ok(Digest::from_hash(hasher.finalize().into()))
    }
}

impl Digester for Sha256Digester {
    fn digest_file(&self, path: &Path) -> DigestResult<Digest> {
        let io_err = |source| DigestError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(io_err)?;
        let mut reader = BufReader::new(file);
        Self::digest_reader(&mut reader).map_err(io_err)
    }
}

/// Wraps a digester and counts how many files it was asked to hash.
#[derive(Debug, Default)]
pub struct CountingDigester<D> {
    inner: D,
    calls: AtomicUsize,
}

impl<D> CountingDigester<D> {
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `digest_file` calls so far, successful or not.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.calls.store(0, Ordering::Relaxed);
    }
}

impl<D: Digester> Digester for CountingDigester<D> {
    fn digest_file(&self, path: &Path) -> DigestResult<Digest> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.inner.digest_file(path)
    }
}
