//! # Book List
//!
//! Coordinator logic for the list screen: loading, sorting, searching and
//! deleting, plus the navigation effects for opening or creating a book.
//!
//! Fetch-vs-search routing: a non-blank `search_query` sends every load through
//! SearchBooks; a blank one always goes to GetBooks. Typing a query does not
//! search by itself; the view submits `Search` explicitly. Clearing the query
//! reloads the full list straight away.

use async_trait::async_trait;
use log::{debug, warn};
use tokio::runtime::Handle;

use crate::catalog::types::{Book, BookId, SortOrder};
use crate::catalog::usecases::{DeleteBook, GetBooks, SearchBooks, UseCases};

use super::coordinator::{Coordinator, Reducer};
use super::store::{EffectChannel, StateStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListAction {
    RequestLoad,
    CreateNew,
    Delete(BookId),
    Open(BookId),
    ChangeSort(SortOrder),
    UpdateQuery(String),
    Search,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ListEffect {
    #[default]
    None,
    NavigateToCreate,
    NavigateToBook(BookId),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListViewState {
    /// Already ordered by `sort_order`.
    pub books: Vec<Book>,
    pub is_loading: bool,
    pub is_error: bool,
    /// Empty means no filter.
    pub search_query: String,
    pub sort_order: SortOrder,
}

impl ListViewState {
    pub fn with_sort_order(sort_order: SortOrder) -> Self {
        Self {
            sort_order,
            ..Self::default()
        }
    }

    pub fn has_query(&self) -> bool {
        !self.search_query.trim().is_empty()
    }
}

pub type ListCoordinator = Coordinator<BookList>;

pub struct BookList {
    get_books: GetBooks,
    search_books: SearchBooks,
    delete_book: DeleteBook,
}

impl BookList {
    pub fn new(use_cases: &UseCases) -> Self {
        Self {
            get_books: use_cases.get_books.clone(),
            search_books: use_cases.search_books.clone(),
            delete_book: use_cases.delete_book.clone(),
        }
    }

    /// Starts a list coordinator on `scheduler`.
    pub fn spawn(use_cases: &UseCases, initial: ListViewState, scheduler: &Handle) -> ListCoordinator {
        Coordinator::spawn(Self::new(use_cases), initial, scheduler)
    }

    /// The load path. Routes to SearchBooks when a query is active, GetBooks
    /// otherwise, and always issues a fresh fetch.
    async fn refresh(&self, state: &StateStore<ListViewState>) {
        let current = state.snapshot();
        state.update(|s| ListViewState {
            is_loading: true,
            is_error: false,
            ..s
        });

        let result = if current.has_query() {
            self.search_books
                .execute(&current.search_query, current.sort_order)
                .await
        } else {
            debug!("No active query, fetching full list");
            self.get_books.execute(current.sort_order).await
        };
        Self::finish(state, result);
    }

    /// The single terminal transition of a load or search.
    fn finish(state: &StateStore<ListViewState>, result: Option<Vec<Book>>) {
        match result {
            Some(books) => state.update(|s| ListViewState {
                books,
                is_loading: false,
                is_error: false,
                ..s
            }),
            None => state.update(|s| ListViewState {
                is_loading: false,
                is_error: true,
                ..s
            }),
        }
    }
}

#[async_trait]
impl Reducer for BookList {
    type Action = ListAction;
    type State = ListViewState;
    type Effect = ListEffect;

    fn name(&self) -> &'static str {
        "book-list"
    }

    async fn reduce(
        &mut self,
        action: ListAction,
        state: &StateStore<ListViewState>,
        effects: &EffectChannel<ListEffect>,
    ) {
        match action {
            ListAction::RequestLoad | ListAction::Search => self.refresh(state).await,
            ListAction::ChangeSort(order) => {
                state.update(|s| ListViewState {
                    sort_order: order,
                    is_loading: true,
                    ..s
                });
                self.refresh(state).await;
            }
            ListAction::UpdateQuery(query) => {
                let cleared = query.trim().is_empty();
                state.update(|s| ListViewState {
                    search_query: query,
                    ..s
                });
                if cleared {
                    self.refresh(state).await;
                }
            }
            ListAction::Delete(id) => {
                if !self.delete_book.execute(id).await {
                    warn!("Delete of book {} failed in storage, removing from view anyway", id);
                }
                state.update(|s| ListViewState {
                    books: s.books.into_iter().filter(|b| b.id != id).collect(),
                    ..s
                });
            }
            ListAction::CreateNew => effects.emit(ListEffect::NavigateToCreate),
            ListAction::Open(id) => effects.emit(ListEffect::NavigateToBook(id)),
        }
    }
}
