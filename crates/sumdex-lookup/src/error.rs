use thiserror::Error;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("store error: {0}")]
    Store(#[from] sumdex_store::StoreError),
}

pub type LookupResult<T> = Result<T, LookupError>;
