//! # Use Cases
//!
//! One struct per operation the screens need. Each binds a single repository
//! call to the I/O scheduler, so a coordinator awaiting a use case never runs
//! storage work on its own executor.
//!
//! This is also the fault boundary: repository errors are logged here and
//! collapsed into `None` / `false`. Coordinators only ever see "present" or
//! "absent".
//!
//! ```text
//!  coordinator ──execute()──▶ use case ──spawn on io──▶ repository
//!       ▲                                                  │
//!       └────────── Option<T> (sorted, faults logged) ◀────┘
//! ```

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use log::{debug, warn};
use tokio::runtime::Handle;
use tokio::task::AbortHandle;

use super::repository::{BookRepository, BookStream};
use super::types::{Book, BookId, SortOrder};

/// Execution contexts the core runs on.
///
/// `io` runs repository calls; `main` runs the reducer loops. Both may point
/// at the same runtime.
#[derive(Clone, Debug)]
pub struct Schedulers {
    pub io: Handle,
    pub main: Handle,
}

impl Schedulers {
    pub fn new(io: Handle, main: Handle) -> Self {
        Self { io, main }
    }

    /// Uses the ambient runtime for both roles. Panics outside a tokio runtime.
    pub fn current() -> Self {
        let handle = Handle::current();
        Self {
            io: handle.clone(),
            main: handle,
        }
    }
}

/// Aborts the spawned I/O task if the awaiting step is cancelled first.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn run_on<T, F>(io: &Handle, task: F) -> Option<T>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let handle = io.spawn(task);
    let _guard = AbortOnDrop(handle.abort_handle());
    match handle.await {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("I/O task did not complete: {}", e);
            None
        }
    }
}

fn sorted(stream: BookStream, order: SortOrder) -> BookStream {
    stream
        .map(move |result| result.map(|books| order.sorted(books)))
        .boxed()
}

/// Takes the first snapshot of a live query on the I/O scheduler.
async fn first_snapshot(io: &Handle, stream: BookStream, what: &str) -> Option<Vec<Book>> {
    let mut stream = stream;
    match run_on(io, async move { stream.next().await }).await? {
        Some(Ok(books)) => {
            debug!("{} yielded {} books", what, books.len());
            Some(books)
        }
        Some(Err(e)) => {
            warn!("{} failed: {}", what, e);
            None
        }
        None => {
            warn!("{} ended without a result", what);
            None
        }
    }
}

/// Current time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

// ============================================================================
// Queries
// ============================================================================

#[derive(Clone)]
pub struct GetBooks {
    io: Handle,
    repository: Arc<dyn BookRepository>,
}

impl GetBooks {
    pub fn new(io: Handle, repository: Arc<dyn BookRepository>) -> Self {
        Self { io, repository }
    }

    /// Live, sorted view of the whole catalog.
    pub fn observe(&self, order: SortOrder) -> BookStream {
        sorted(self.repository.observe_all(), order)
    }

    /// The current catalog sorted by `order`, or `None` if storage failed.
    pub async fn execute(&self, order: SortOrder) -> Option<Vec<Book>> {
        first_snapshot(&self.io, self.observe(order), "GetBooks").await
    }
}

#[derive(Clone)]
pub struct SearchBooks {
    io: Handle,
    repository: Arc<dyn BookRepository>,
}

impl SearchBooks {
    pub fn new(io: Handle, repository: Arc<dyn BookRepository>) -> Self {
        Self { io, repository }
    }

    pub fn observe(&self, query: &str, order: SortOrder) -> BookStream {
        sorted(self.repository.observe_search(query), order)
    }

    pub async fn execute(&self, query: &str, order: SortOrder) -> Option<Vec<Book>> {
        first_snapshot(&self.io, self.observe(query, order), "SearchBooks").await
    }
}

#[derive(Clone)]
pub struct GetBookById {
    io: Handle,
    repository: Arc<dyn BookRepository>,
}

impl GetBookById {
    pub fn new(io: Handle, repository: Arc<dyn BookRepository>) -> Self {
        Self { io, repository }
    }

    pub async fn execute(&self, id: BookId) -> Option<Book> {
        let repository = Arc::clone(&self.repository);
        match run_on(&self.io, async move { repository.get_by_id(id).await }).await? {
            Ok(book) => Some(book),
            Err(e) => {
                warn!("GetBookById({}) failed: {}", id, e);
                None
            }
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

#[derive(Clone)]
pub struct SaveBook {
    io: Handle,
    repository: Arc<dyn BookRepository>,
}

impl SaveBook {
    pub fn new(io: Handle, repository: Arc<dyn BookRepository>) -> Self {
        Self { io, repository }
    }

    /// Stamps `added_at` with the current time and stores the record.
    /// Returns the stored book (with its assigned id).
    pub async fn execute(&self, book: Book) -> Option<Book> {
        let repository = Arc::clone(&self.repository);
        let stamped = Book {
            added_at: now_millis(),
            ..book
        };
        match run_on(&self.io, async move { repository.insert_or_replace(stamped).await }).await? {
            Ok(stored) => Some(stored),
            Err(e) => {
                warn!("SaveBook failed: {}", e);
                None
            }
        }
    }
}

#[derive(Clone)]
pub struct DeleteBook {
    io: Handle,
    repository: Arc<dyn BookRepository>,
}

impl DeleteBook {
    pub fn new(io: Handle, repository: Arc<dyn BookRepository>) -> Self {
        Self { io, repository }
    }

    /// Returns `false` if storage reported a failure.
    pub async fn execute(&self, id: BookId) -> bool {
        let repository = Arc::clone(&self.repository);
        match run_on(&self.io, async move { repository.delete(id).await }).await {
            Some(Ok(())) => true,
            Some(Err(e)) => {
                warn!("DeleteBook({}) failed: {}", id, e);
                false
            }
            None => false,
        }
    }
}

/// All use cases over one repository, wired to one I/O scheduler.
#[derive(Clone)]
pub struct UseCases {
    pub get_books: GetBooks,
    pub search_books: SearchBooks,
    pub get_book_by_id: GetBookById,
    pub save_book: SaveBook,
    pub delete_book: DeleteBook,
}

impl UseCases {
    pub fn new(schedulers: &Schedulers, repository: Arc<dyn BookRepository>) -> Self {
        let io = schedulers.io.clone();
        Self {
            get_books: GetBooks::new(io.clone(), Arc::clone(&repository)),
            search_books: SearchBooks::new(io.clone(), Arc::clone(&repository)),
            get_book_by_id: GetBookById::new(io.clone(), Arc::clone(&repository)),
            save_book: SaveBook::new(io.clone(), Arc::clone(&repository)),
            delete_book: DeleteBook::new(io, repository),
        }
    }
}
