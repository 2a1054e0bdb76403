//! Error types for the todo store.

use crate::msg::DecodeError;
use thiserror::Error;
use todo_store_runtime::StoreError;

/// Errors returned by [`crate::TodoStore`]
#[derive(Error, Debug)]
pub enum TodoError {
    /// The underlying store rejected the action
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A boundary message could not be decoded
    #[error(transparent)]
    Decode(#[from] DecodeError),
}
