//! # Book Detail
//!
//! Coordinator logic for the single-book form. One instance serves one book
//! identity; id `0` means the form is creating a new book.
//!
//! Saving validates before anything touches storage. A record that fails
//! validation is never written and produces `ShowInvalidBookWarning` instead of
//! navigating back.

use async_trait::async_trait;
use log::{info, warn};
use tokio::runtime::Handle;

use crate::catalog::types::{Book, BookId, NEW_BOOK_ID};
use crate::catalog::usecases::{DeleteBook, GetBookById, SaveBook, UseCases};

use super::coordinator::{Coordinator, Reducer};
use super::store::{EffectChannel, StateStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailAction {
    Load(BookId),
    Delete(BookId),
    Save(Book),
    Update(Book),
    Back,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DetailEffect {
    #[default]
    None,
    NavigateBack,
    ShowInvalidBookWarning,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailViewState {
    /// Absent for a new book, or while nothing has been loaded.
    pub book: Option<Book>,
    pub is_loading: bool,
    pub is_error: bool,
}

pub type DetailCoordinator = Coordinator<BookDetail>;

pub struct BookDetail {
    get_book_by_id: GetBookById,
    save_book: SaveBook,
    delete_book: DeleteBook,
}

impl BookDetail {
    pub fn new(use_cases: &UseCases) -> Self {
        Self {
            get_book_by_id: use_cases.get_book_by_id.clone(),
            save_book: use_cases.save_book.clone(),
            delete_book: use_cases.delete_book.clone(),
        }
    }

    pub fn spawn(use_cases: &UseCases, scheduler: &Handle) -> DetailCoordinator {
        Coordinator::spawn(Self::new(use_cases), DetailViewState::default(), scheduler)
    }

    async fn load(&self, id: BookId, state: &StateStore<DetailViewState>) {
        if id == NEW_BOOK_ID {
            state.update(|s| DetailViewState {
                is_loading: false,
                is_error: false,
                ..s
            });
            return;
        }

        state.update(|s| DetailViewState {
            is_loading: true,
            is_error: false,
            ..s
        });
        let book = self.get_book_by_id.execute(id).await;
        if book.is_none() {
            warn!("Book {} could not be loaded, showing an empty form", id);
        }
        state.update(|s| DetailViewState {
            book,
            is_loading: false,
            ..s
        });
    }

    async fn save(
        &self,
        book: Book,
        state: &StateStore<DetailViewState>,
        effects: &EffectChannel<DetailEffect>,
    ) {
        state.update(|s| DetailViewState {
            is_loading: true,
            ..s
        });

        if !book.is_valid() {
            info!("Rejected book with invalid fields: {:?}", book.invalid_fields());
            state.update(|s| DetailViewState {
                is_loading: false,
                ..s
            });
            effects.emit(DetailEffect::ShowInvalidBookWarning);
            return;
        }

        match self.save_book.execute(book).await {
            Some(stored) => {
                state.update(|_| DetailViewState {
                    book: Some(stored),
                    is_loading: false,
                    is_error: false,
                });
                effects.emit(DetailEffect::NavigateBack);
            }
            None => state.update(|s| DetailViewState {
                is_loading: false,
                is_error: true,
                ..s
            }),
        }
    }

    async fn delete(
        &self,
        id: BookId,
        state: &StateStore<DetailViewState>,
        effects: &EffectChannel<DetailEffect>,
    ) {
        state.update(|s| DetailViewState {
            is_loading: true,
            ..s
        });

        if self.delete_book.execute(id).await {
            state.update(|s| DetailViewState {
                is_loading: false,
                ..s
            });
            effects.emit(DetailEffect::NavigateBack);
        } else {
            state.update(|s| DetailViewState {
                is_loading: false,
                is_error: true,
                ..s
            });
        }
    }
}

#[async_trait]
impl Reducer for BookDetail {
    type Action = DetailAction;
    type State = DetailViewState;
    type Effect = DetailEffect;

    fn name(&self) -> &'static str {
        "book-detail"
    }

    async fn reduce(
        &mut self,
        action: DetailAction,
        state: &StateStore<DetailViewState>,
        effects: &EffectChannel<DetailEffect>,
    ) {
        match action {
            DetailAction::Load(id) => self.load(id, state).await,
            DetailAction::Save(book) | DetailAction::Update(book) => {
                self.save(book, state, effects).await
            }
            DetailAction::Delete(id) => self.delete(id, state, effects).await,
            DetailAction::Back => effects.emit(DetailEffect::NavigateBack),
        }
    }
}
