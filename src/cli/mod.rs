//! # CLI Adapter
//!
//! A line-oriented stand-in for the list and detail screens. Each command
//! spawns the coordinator it needs, submits actions the way a view would,
//! waits for the loop to settle, then renders the resulting state or reacts
//! to the pending effect and acknowledges it.
//!
//! This is the only module that knows about clap and terminal output.

use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;

use chrono::DateTime;
use clap::{Parser, Subcommand};
use log::{info, warn};
use tokio::runtime::Handle;

use crate::catalog::{Book, BookId, SortOrder, UseCases};
use crate::core::{
    BookDetail, BookList, DetailAction, DetailEffect, ListAction, ListViewState, SubmitError,
};

#[derive(Parser, Debug)]
#[command(name = "bookhaven", about = "Personal book catalog")]
pub struct Args {
    /// Catalog JSON file (overrides config and BOOKHAVEN_DATA_FILE)
    #[arg(long, global = true)]
    pub data_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List books, optionally filtered by title or author
    List {
        /// "date_added" or "name"
        #[arg(short, long)]
        sort: Option<SortOrder>,
        #[arg(short, long)]
        query: Option<String>,
    },
    /// Show one book
    Show { id: BookId },
    /// Add a new book
    Add {
        #[arg(long)]
        title: String,
        #[arg(long)]
        author: String,
        #[arg(long)]
        year: String,
        #[arg(long, default_value = "")]
        notes: String,
    },
    /// Change fields of an existing book
    Edit {
        id: BookId,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        year: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Delete a book
    Delete { id: BookId },
}

impl Command {
    /// The sort order requested on the command line, if any.
    pub fn sort(&self) -> Option<SortOrder> {
        match self {
            Command::List { sort, .. } => *sort,
            _ => None,
        }
    }
}

impl Default for Command {
    fn default() -> Self {
        Command::List {
            sort: None,
            query: None,
        }
    }
}

#[derive(Debug)]
pub enum CliError {
    Io(io::Error),
    Coordinator(SubmitError),
    NotFound(BookId),
    /// Field names that failed validation.
    Invalid(Vec<&'static str>),
    Storage,
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Io(e) => write!(f, "output error: {e}"),
            CliError::Coordinator(e) => write!(f, "{e}"),
            CliError::NotFound(id) => write!(f, "no book with id {id}"),
            CliError::Invalid(fields) => write!(
                f,
                "invalid book: {} must be at least 2 characters",
                fields.join(", ")
            ),
            CliError::Storage => write!(f, "the catalog could not be read or written, see the log"),
        }
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        CliError::Io(e)
    }
}

impl From<SubmitError> for CliError {
    fn from(e: SubmitError) -> Self {
        CliError::Coordinator(e)
    }
}

/// What every command needs to spawn coordinators.
pub struct Session {
    pub use_cases: UseCases,
    /// Where coordinator loops run.
    pub main: Handle,
    pub default_sort: SortOrder,
}

impl Session {
    pub async fn run(&self, command: Command, out: &mut impl Write) -> Result<(), CliError> {
        info!("Running {:?}", command);
        match command {
            Command::List { sort, query } => {
                self.list(sort.unwrap_or(self.default_sort), query, out).await
            }
            Command::Show { id } => self.show(id, out).await,
            Command::Add {
                title,
                author,
                year,
                notes,
            } => {
                let stored = self.save(Book::new(title, author, year, notes)).await?;
                writeln!(out, "Added #{} {}", stored.id, stored.title)?;
                Ok(())
            }
            Command::Edit {
                id,
                title,
                author,
                year,
                notes,
            } => {
                let mut book = self.load(id).await?;
                if let Some(title) = title {
                    book.title = title;
                }
                if let Some(author) = author {
                    book.author = author;
                }
                if let Some(year) = year {
                    book.year = year;
                }
                if let Some(notes) = notes {
                    book.notes = notes;
                }
                let stored = self.save(book).await?;
                writeln!(out, "Updated #{} {}", stored.id, stored.title)?;
                Ok(())
            }
            Command::Delete { id } => {
                self.delete(id).await?;
                writeln!(out, "Deleted #{}", id)?;
                Ok(())
            }
        }
    }

    async fn list(
        &self,
        sort: SortOrder,
        query: Option<String>,
        out: &mut impl Write,
    ) -> Result<(), CliError> {
        let list = BookList::spawn(
            &self.use_cases,
            ListViewState::with_sort_order(sort),
            &self.main,
        );
        match query {
            Some(query) => {
                list.submit(ListAction::UpdateQuery(query))?;
                list.submit(ListAction::Search)?;
            }
            None => list.submit(ListAction::RequestLoad)?,
        }
        list.settle().await?;

        let state = list.snapshot();
        if state.is_error {
            return Err(CliError::Storage);
        }
        render_list(&state, out)?;
        Ok(())
    }

    async fn show(&self, id: BookId, out: &mut impl Write) -> Result<(), CliError> {
        let book = self.load(id).await?;
        render_book(&book, out)?;
        Ok(())
    }

    async fn load(&self, id: BookId) -> Result<Book, CliError> {
        let detail = BookDetail::spawn(&self.use_cases, &self.main);
        detail.submit(DetailAction::Load(id))?;
        detail.settle().await?;
        detail.snapshot().book.ok_or(CliError::NotFound(id))
    }

    async fn save(&self, book: Book) -> Result<Book, CliError> {
        let detail = BookDetail::spawn(&self.use_cases, &self.main);
        let action = if book.is_new() {
            DetailAction::Save(book.clone())
        } else {
            DetailAction::Update(book.clone())
        };
        detail.submit(action)?;
        detail.settle().await?;

        let effect = detail.current_effect();
        detail.acknowledge_effect();
        let state = detail.snapshot();
        match effect {
            DetailEffect::NavigateBack => state.book.ok_or(CliError::Storage),
            DetailEffect::ShowInvalidBookWarning => Err(CliError::Invalid(book.invalid_fields())),
            DetailEffect::None => {
                warn!("Save finished without an effect (error: {})", state.is_error);
                Err(CliError::Storage)
            }
        }
    }

    async fn delete(&self, id: BookId) -> Result<(), CliError> {
        let detail = BookDetail::spawn(&self.use_cases, &self.main);
        detail.submit(DetailAction::Delete(id))?;
        detail.settle().await?;

        let effect = detail.current_effect();
        detail.acknowledge_effect();
        match effect {
            DetailEffect::NavigateBack => Ok(()),
            _ => Err(CliError::Storage),
        }
    }
}

// ============================================================================
// Rendering
// ============================================================================

const TITLE_WIDTH: usize = 32;
const AUTHOR_WIDTH: usize = 22;

/// `2024-03-01`, or `-` for a book that was never saved.
pub fn format_date(added_at: i64) -> String {
    if added_at <= 0 {
        return "-".to_string();
    }
    DateTime::from_timestamp_millis(added_at)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Clips to `width` characters, marking the cut with `…`.
fn clip(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(width.saturating_sub(1)).collect();
    clipped.push('…');
    clipped
}

/// One fixed-width line per book.
pub fn format_book_row(book: &Book) -> String {
    format!(
        "{:>5}  {:<tw$}  {:<aw$}  {:<8}  {}",
        book.id,
        clip(&book.title, TITLE_WIDTH),
        clip(&book.author, AUTHOR_WIDTH),
        clip(&book.year, 8),
        format_date(book.added_at),
        tw = TITLE_WIDTH,
        aw = AUTHOR_WIDTH,
    )
}

fn render_list(state: &ListViewState, out: &mut impl Write) -> io::Result<()> {
    if state.books.is_empty() {
        if state.has_query() {
            writeln!(out, "No books match \"{}\".", state.search_query.trim())?;
        } else {
            writeln!(out, "The catalog is empty.")?;
        }
        return Ok(());
    }

    writeln!(
        out,
        "{} book(s), sorted by {}",
        state.books.len(),
        state.sort_order
    )?;
    for book in &state.books {
        writeln!(out, "{}", format_book_row(book))?;
    }
    Ok(())
}

fn render_book(book: &Book, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "#{} {}", book.id, book.title)?;
    writeln!(out, "  Author: {}", book.author)?;
    writeln!(out, "  Year:   {}", book.year)?;
    writeln!(out, "  Added:  {}", format_date(book.added_at))?;
    if !book.notes.trim().is_empty() {
        writeln!(out, "  Notes:  {}", book.notes.trim())?;
    }
    Ok(())
}
