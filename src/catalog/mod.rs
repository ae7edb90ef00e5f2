pub mod repositories;
pub mod repository;
pub mod types;
pub mod usecases;

pub use repositories::LocalRepository;
pub use repository::{BookRepository, BookStream, RepositoryError};
pub use types::{Book, BookId, NEW_BOOK_ID, SortOrder};
pub use usecases::{DeleteBook, GetBookById, GetBooks, SaveBook, Schedulers, SearchBooks, UseCases};
