//! Test utilities shared across the crate.
//!
//! This module is only compiled during tests (`#[cfg(test)]`).

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio::sync::Semaphore;

use crate::catalog::repositories::LocalRepository;
use crate::catalog::repository::{BookRepository, BookStream, RepositoryError};
use crate::catalog::types::{Book, BookId};

/// An in-memory repository pre-filled with `books`, in order.
pub async fn seeded(books: impl IntoIterator<Item = Book>) -> Arc<LocalRepository> {
    let repo = LocalRepository::in_memory();
    for book in books {
        repo.insert_or_replace(book).await.unwrap();
    }
    Arc::new(repo)
}

/// Shorthand for a valid book with a fixed id and timestamp.
pub fn book(id: BookId, title: &str, added_at: i64) -> Book {
    Book {
        id,
        added_at,
        ..Book::new(title, "Author", "2024", "")
    }
}

/// A repository whose every operation fails.
pub struct FailingRepository;

fn io_error() -> RepositoryError {
    RepositoryError::Io("disk unplugged".to_string())
}

#[async_trait]
impl BookRepository for FailingRepository {
    fn observe_all(&self) -> BookStream {
        stream::iter([Err(io_error())]).boxed()
    }

    fn observe_search(&self, _query: &str) -> BookStream {
        stream::iter([Err(io_error())]).boxed()
    }

    async fn get_by_id(&self, _id: BookId) -> Result<Book, RepositoryError> {
        Err(io_error())
    }

    async fn insert_or_replace(&self, _book: Book) -> Result<Book, RepositoryError> {
        Err(io_error())
    }

    async fn delete(&self, _id: BookId) -> Result<(), RepositoryError> {
        Err(io_error())
    }
}

/// Wraps a [`LocalRepository`] and counts calls per operation.
#[derive(Default)]
pub struct CountingRepository {
    pub inner: LocalRepository,
    pub queries: AtomicUsize,
    pub lookups: AtomicUsize,
    pub writes: AtomicUsize,
    pub deletes: AtomicUsize,
}

impl CountingRepository {
    pub fn total_calls(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
            + self.lookups.load(Ordering::SeqCst)
            + self.writes.load(Ordering::SeqCst)
            + self.deletes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BookRepository for CountingRepository {
    fn observe_all(&self) -> BookStream {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.inner.observe_all()
    }

    fn observe_search(&self, query: &str) -> BookStream {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.inner.observe_search(query)
    }

    async fn get_by_id(&self, id: BookId) -> Result<Book, RepositoryError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.get_by_id(id).await
    }

    async fn insert_or_replace(&self, book: Book) -> Result<Book, RepositoryError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.insert_or_replace(book).await
    }

    async fn delete(&self, id: BookId) -> Result<(), RepositoryError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(id).await
    }
}

/// Holds every lookup and query until a permit is released, so tests can
/// observe in-flight state.
pub struct GatedRepository {
    pub inner: LocalRepository,
    pub gate: Arc<Semaphore>,
}

impl GatedRepository {
    pub fn new(inner: LocalRepository) -> Self {
        Self {
            inner,
            gate: Arc::new(Semaphore::new(0)),
        }
    }

    /// Lets one pending call through.
    pub fn release(&self) {
        self.gate.add_permits(1);
    }
}

#[async_trait]
impl BookRepository for GatedRepository {
    fn observe_all(&self) -> BookStream {
        let gate = Arc::clone(&self.gate);
        let inner = self.inner.observe_all();
        stream::once(async move {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
            inner
        })
        .flatten()
        .boxed()
    }

    fn observe_search(&self, query: &str) -> BookStream {
        self.inner.observe_search(query)
    }

    async fn get_by_id(&self, id: BookId) -> Result<Book, RepositoryError> {
        if let Ok(permit) = self.gate.acquire().await {
            permit.forget();
        }
        self.inner.get_by_id(id).await
    }

    async fn insert_or_replace(&self, book: Book) -> Result<Book, RepositoryError> {
        self.inner.insert_or_replace(book).await
    }

    async fn delete(&self, id: BookId) -> Result<(), RepositoryError> {
        self.inner.delete(id).await
    }
}

/// Fails the first `failures` list queries, then delegates to `inner`.
pub struct FlakyRepository {
    pub inner: LocalRepository,
    failures: AtomicUsize,
}

impl FlakyRepository {
    pub fn new(inner: LocalRepository, failures: usize) -> Self {
        Self {
            inner,
            failures: AtomicUsize::new(failures),
        }
    }

    fn should_fail(&self) -> bool {
        self.failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl BookRepository for FlakyRepository {
    fn observe_all(&self) -> BookStream {
        if self.should_fail() {
            return stream::iter([Err(io_error())]).boxed();
        }
        self.inner.observe_all()
    }

    fn observe_search(&self, query: &str) -> BookStream {
        if self.should_fail() {
            return stream::iter([Err(io_error())]).boxed();
        }
        self.inner.observe_search(query)
    }

    async fn get_by_id(&self, id: BookId) -> Result<Book, RepositoryError> {
        self.inner.get_by_id(id).await
    }

    async fn insert_or_replace(&self, book: Book) -> Result<Book, RepositoryError> {
        self.inner.insert_or_replace(book).await
    }

    async fn delete(&self, id: BookId) -> Result<(), RepositoryError> {
        self.inner.delete(id).await
    }
}
