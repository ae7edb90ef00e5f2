use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::watch;

use super::types::{Book, BookId};

/// Errors that can occur during repository operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// No record with this id exists.
    NotFound(BookId),
    /// Reading or writing the backing file failed.
    Io(String),
    /// The backing file exists but could not be decoded.
    Parse(String),
    /// The id cannot be stored because no id could follow it.
    InvalidId(BookId),
}

impl fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepositoryError::NotFound(id) => write!(f, "book {id} not found"),
            RepositoryError::Io(msg) => write!(f, "storage I/O error: {msg}"),
            RepositoryError::Parse(msg) => write!(f, "storage parse error: {msg}"),
            RepositoryError::InvalidId(id) => write!(f, "book id {id} is out of range"),
        }
    }
}

impl std::error::Error for RepositoryError {}

impl From<std::io::Error> for RepositoryError {
    fn from(e: std::io::Error) -> Self {
        RepositoryError::Io(e.to_string())
    }
}

/// A live query: yields the current result immediately, then a fresh
/// snapshot after every mutation of the underlying store.
pub type BookStream = BoxStream<'static, Result<Vec<Book>, RepositoryError>>;

#[async_trait]
pub trait BookRepository: Send + Sync {
    /// Every stored book, in storage iteration order.
    fn observe_all(&self) -> BookStream;

    /// Books whose title or author contains `query`, ignoring case.
    fn observe_search(&self, query: &str) -> BookStream;

    async fn get_by_id(&self, id: BookId) -> Result<Book, RepositoryError>;

    /// Stores `book`, assigning a fresh id when it has none. Returns the stored record.
    async fn insert_or_replace(&self, book: Book) -> Result<Book, RepositoryError>;

    /// Removes the record with `id`. Missing ids are not an error.
    async fn delete(&self, id: BookId) -> Result<(), RepositoryError>;
}

/// Builds a [`BookStream`] that re-runs `fetch` every time `revisions` ticks.
///
/// The stream ends when the revision sender is dropped.
pub fn live_query<F>(revisions: watch::Receiver<u64>, fetch: F) -> BookStream
where
    F: Fn() -> BoxFuture<'static, Result<Vec<Book>, RepositoryError>> + Send + Sync + 'static,
{
    let fetch = Arc::new(fetch);
    stream::unfold((revisions, true), move |(mut revisions, first)| {
        let fetch = Arc::clone(&fetch);
        async move {
            if first {
                revisions.borrow_and_update();
            } else {
                revisions.changed().await.ok()?;
            }
            let snapshot = fetch().await;
            Some((snapshot, (revisions, false)))
        }
    })
    .boxed()
}
