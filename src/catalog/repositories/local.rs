//! Local book storage.
//!
//! The whole table lives in memory behind a `tokio::sync::RwLock`: writers take
//! the lock exclusively, so a query never enumerates a half-applied mutation.
//! Every committed write bumps a `watch` revision, which is what makes
//! `observe_all` / `observe_search` re-emit. Only repository handles own the
//! revision sender, so live queries end once the last handle is dropped.
//!
//! When opened with a path, the table is loaded from a JSON file and written
//! back after each mutation using atomic rename (write `.tmp`, then `rename()`).

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, watch};

use crate::catalog::repository::{BookRepository, BookStream, RepositoryError, live_query};
use crate::catalog::types::{Book, BookId, NEW_BOOK_ID};

const FORMAT_VERSION: u32 = 1;

/// On-disk container. Rows keep insertion order, which is the storage
/// iteration order sorts fall back to on ties.
#[derive(Serialize, Deserialize, Debug, Clone)]
struct BookTable {
    version: u32,
    next_id: BookId,
    #[serde(default)]
    books: Vec<Book>,
}

impl Default for BookTable {
    fn default() -> Self {
        Self {
            version: FORMAT_VERSION,
            next_id: 1,
            books: Vec::new(),
        }
    }
}

impl BookTable {
    fn upsert(&mut self, mut book: Book) -> Result<Book, RepositoryError> {
        if book.id == NEW_BOOK_ID {
            book.id = self.next_id;
        }
        let following = book
            .id
            .checked_add(1)
            .ok_or(RepositoryError::InvalidId(book.id))?;
        self.next_id = self.next_id.max(following);

        match self.books.iter_mut().find(|b| b.id == book.id) {
            Some(existing) => *existing = book.clone(),
            None => self.books.push(book.clone()),
        }
        Ok(book)
    }

    fn remove(&mut self, id: BookId) -> bool {
        let before = self.books.len();
        self.books.retain(|b| b.id != id);
        self.books.len() != before
    }

    fn search(&self, query: &str) -> Vec<Book> {
        self.books.iter().filter(|b| b.matches(query)).cloned().collect()
    }
}

/// State reachable from live-query fetches. Holds no revision sender.
struct Shared {
    table: RwLock<BookTable>,
    path: Option<PathBuf>,
}

/// Thread-safe [`BookRepository`] backed by memory, optionally mirrored to a JSON file.
#[derive(Clone)]
pub struct LocalRepository {
    shared: Arc<Shared>,
    revision: Arc<watch::Sender<u64>>,
}

impl LocalRepository {
    /// An empty repository that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self::with_table(BookTable::default(), None)
    }

    /// Opens (or creates) the JSON file at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, RepositoryError> {
        let path = path.into();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let table = if path.exists() {
            let json = fs::read_to_string(&path)?;
            let table: BookTable =
                serde_json::from_str(&json).map_err(|e| RepositoryError::Parse(e.to_string()))?;
            info!("Loaded {} books from {}", table.books.len(), path.display());
            table
        } else {
            info!("No catalog at {}, starting empty", path.display());
            BookTable::default()
        };

        Ok(Self::with_table(table, Some(path)))
    }

    fn with_table(table: BookTable, path: Option<PathBuf>) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                table: RwLock::new(table),
                path,
            }),
            revision: Arc::new(revision),
        }
    }

    /// Persists (if file-backed) and publishes a new revision. Call with the
    /// write lock held.
    fn commit(&self, table: &BookTable) -> Result<(), RepositoryError> {
        if let Some(ref path) = self.shared.path {
            atomic_write_json(path, table)?;
        }
        self.revision.send_modify(|r| *r = r.wrapping_add(1));
        Ok(())
    }

    pub fn path(&self) -> Option<&Path> {
        self.shared.path.as_deref()
    }

    pub async fn len(&self) -> usize {
        self.shared.table.read().await.books.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for LocalRepository {
    fn default() -> Self {
        Self::in_memory()
    }
}

#[async_trait]
impl BookRepository for LocalRepository {
    fn observe_all(&self) -> BookStream {
        let shared = Arc::clone(&self.shared);
        live_query(self.revision.subscribe(), move || {
            let shared = Arc::clone(&shared);
            async move { Ok(shared.table.read().await.books.clone()) }.boxed()
        })
    }

    fn observe_search(&self, query: &str) -> BookStream {
        let shared = Arc::clone(&self.shared);
        let query = query.to_string();
        live_query(self.revision.subscribe(), move || {
            let shared = Arc::clone(&shared);
            let query = query.clone();
            async move { Ok(shared.table.read().await.search(&query)) }.boxed()
        })
    }

    async fn get_by_id(&self, id: BookId) -> Result<Book, RepositoryError> {
        self.shared
            .table
            .read()
            .await
            .books
            .iter()
            .find(|b| b.id == id)
            .cloned()
            .ok_or(RepositoryError::NotFound(id))
    }

    async fn insert_or_replace(&self, book: Book) -> Result<Book, RepositoryError> {
        let mut table = self.shared.table.write().await;
        let mut staged = table.clone();
        let stored = staged.upsert(book)?;
        self.commit(&staged)?;
        *table = staged;
        debug!("Stored book {} ({:?})", stored.id, stored.title);
        Ok(stored)
    }

    async fn delete(&self, id: BookId) -> Result<(), RepositoryError> {
        let mut table = self.shared.table.write().await;
        let mut staged = table.clone();
        if !staged.remove(id) {
            debug!("Delete of unknown book {} ignored", id);
            return Ok(());
        }
        self.commit(&staged)?;
        *table = staged;
        debug!("Deleted book {}", id);
        Ok(())
    }
}

/// Atomically write `data` as JSON to `path` (via `.tmp` + rename).
fn atomic_write_json<T: Serialize>(path: &Path, data: &T) -> Result<(), RepositoryError> {
    let tmp_path = path.with_extension("tmp");
    let json =
        serde_json::to_string_pretty(data).map_err(|e| RepositoryError::Parse(e.to_string()))?;
    fs::write(&tmp_path, json)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn book(title: &str, author: &str) -> Book {
        Book::new(title, author, "2024", "")
    }

    #[tokio::test]
    async fn test_insert_assigns_incrementing_ids() {
        let repo = LocalRepository::in_memory();
        let a = repo.insert_or_replace(book("First", "Ann")).await.unwrap();
        let b = repo.insert_or_replace(book("Second", "Bob")).await.unwrap();
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert_eq!(repo.len().await, 2);
    }

    #[tokio::test]
    async fn test_insert_with_existing_id_replaces_in_place() {
        let repo = LocalRepository::in_memory();
        let a = repo.insert_or_replace(book("First", "Ann")).await.unwrap();
        repo.insert_or_replace(book("Second", "Bob")).await.unwrap();

        let edited = Book {
            title: "First, revised".into(),
            ..a
        };
        repo.insert_or_replace(edited).await.unwrap();

        let all = repo.observe_all().next().await.unwrap().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].title, "First, revised");
    }

    #[tokio::test]
    async fn test_explicit_id_advances_next_id() {
        let repo = LocalRepository::in_memory();
        repo.insert_or_replace(Book { id: 10, ..book("Ten", "Tia") }).await.unwrap();
        let next = repo.insert_or_replace(book("Next", "Ned")).await.unwrap();
        assert_eq!(next.id, 11);
    }

    #[tokio::test]
    async fn test_get_by_id_missing_is_not_found() {
        let repo = LocalRepository::in_memory();
        assert_eq!(repo.get_by_id(42).await, Err(RepositoryError::NotFound(42)));
    }

    #[tokio::test]
    async fn test_delete_missing_is_noop() {
        let repo = LocalRepository::in_memory();
        repo.insert_or_replace(book("Keep", "Kim")).await.unwrap();
        repo.delete(99).await.unwrap();
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn test_search_matches_title_or_author() {
        let repo = LocalRepository::in_memory();
        repo.insert_or_replace(book("Rust in Action", "Tim")).await.unwrap();
        repo.insert_or_replace(book("Go Programming", "Rusty Smith")).await.unwrap();
        repo.insert_or_replace(book("Python", "Guido")).await.unwrap();

        let hits = repo.observe_search("rust").next().await.unwrap().unwrap();
        let titles: Vec<_> = hits.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, vec!["Rust in Action", "Go Programming"]);
    }

    #[tokio::test]
    async fn test_observe_all_re_emits_on_mutation() {
        let repo = LocalRepository::in_memory();
        let mut live = repo.observe_all();
        assert!(live.next().await.unwrap().unwrap().is_empty());

        let stored = repo.insert_or_replace(book("Live", "Lou")).await.unwrap();
        assert_eq!(live.next().await.unwrap().unwrap().len(), 1);

        repo.delete(stored.id).await.unwrap();
        assert!(live.next().await.unwrap().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_observe_search_re_emits_on_mutation() {
        let repo = LocalRepository::in_memory();
        let mut live = repo.observe_search("dune");
        assert!(live.next().await.unwrap().unwrap().is_empty());

        repo.insert_or_replace(book("Dune", "Frank Herbert")).await.unwrap();
        let hits = live.next().await.unwrap().unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_live_queries_end_when_repository_dropped() {
        let repo = LocalRepository::in_memory();
        let mut all = repo.observe_all();
        let mut hits = repo.observe_search("x");
        assert!(all.next().await.unwrap().unwrap().is_empty());
        assert!(hits.next().await.unwrap().unwrap().is_empty());

        drop(repo);
        let ended = tokio::time::timeout(std::time::Duration::from_secs(1), async {
            (all.next().await.is_none(), hits.next().await.is_none())
        })
        .await
        .unwrap();
        assert_eq!(ended, (true, true));
    }

    #[tokio::test]
    async fn test_live_query_survives_while_a_clone_is_alive() {
        let repo = LocalRepository::in_memory();
        let writer = repo.clone();
        let mut live = repo.observe_all();
        live.next().await.unwrap().unwrap();

        drop(repo);
        writer.insert_or_replace(book("Late", "Lee")).await.unwrap();
        assert_eq!(live.next().await.unwrap().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_max_id_is_rejected_without_writing() {
        let repo = LocalRepository::in_memory();
        let result = repo
            .insert_or_replace(Book { id: BookId::MAX, ..book("Edge", "Eve") })
            .await;
        assert_eq!(result, Err(RepositoryError::InvalidId(BookId::MAX)));
        assert!(repo.is_empty().await);

        let next = repo.insert_or_replace(book("Normal", "Nat")).await.unwrap();
        assert_eq!(next.id, 1);
    }

    #[tokio::test]
    async fn test_file_backed_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("books.json");

        let repo = LocalRepository::open(&path).unwrap();
        repo.insert_or_replace(book("Persisted", "Pat")).await.unwrap();
        repo.insert_or_replace(book("Removed", "Rae")).await.unwrap();
        repo.delete(2).await.unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());

        let reopened = LocalRepository::open(&path).unwrap();
        assert_eq!(reopened.len().await, 1);
        assert_eq!(reopened.get_by_id(1).await.unwrap().title, "Persisted");

        // Ids are never reused after a delete.
        let next = reopened.insert_or_replace(book("Third", "Tess")).await.unwrap();
        assert_eq!(next.id, 3);
    }

    #[tokio::test]
    async fn test_open_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("books.json");
        fs::write(&path, "not json").unwrap();

        let result = LocalRepository::open(&path);
        assert!(matches!(result, Err(RepositoryError::Parse(_))));
    }
}
