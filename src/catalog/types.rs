use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Integer identity of a stored book.
pub type BookId = i64;

/// Id carried by a book that has not been persisted yet.
pub const NEW_BOOK_ID: BookId = 0;

/// Minimum trimmed length for `title`, `author` and `year`.
pub const MIN_FIELD_LEN: usize = 2;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author: String,
    /// Free-form, e.g. "1984" or "c. 1600".
    pub year: String,
    #[serde(default)]
    pub notes: String,
    /// Milliseconds since the Unix epoch, stamped when the book is saved.
    pub added_at: i64,
}

impl Book {
    /// A blank, not-yet-persisted record.
    pub fn new(
        title: impl Into<String>,
        author: impl Into<String>,
        year: impl Into<String>,
        notes: impl Into<String>,
    ) -> Self {
        Self {
            id: NEW_BOOK_ID,
            title: title.into(),
            author: author.into(),
            year: year.into(),
            notes: notes.into(),
            added_at: 0,
        }
    }

    pub fn is_new(&self) -> bool {
        self.id == NEW_BOOK_ID
    }

    /// True when trimmed title, author and year each have at least
    /// [`MIN_FIELD_LEN`] characters.
    pub fn is_valid(&self) -> bool {
        self.invalid_fields().is_empty()
    }

    /// Names of the fields that fail the length rule, in declaration order.
    pub fn invalid_fields(&self) -> Vec<&'static str> {
        [
            ("title", &self.title),
            ("author", &self.author),
            ("year", &self.year),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().chars().count() < MIN_FIELD_LEN)
        .map(|(name, _)| name)
        .collect()
    }

    /// Case-insensitive containment on title or author.
    pub fn matches(&self, query: &str) -> bool {
        let needle = query.to_lowercase();
        self.title.to_lowercase().contains(&needle) || self.author.to_lowercase().contains(&needle)
    }
}

/// Ordering applied to every list result before it reaches a coordinator.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Newest first.
    #[default]
    #[serde(alias = "date_added", alias = "date")]
    ByDateAdded,
    /// Case-insensitive title, A to Z.
    #[serde(alias = "name", alias = "title")]
    ByName,
}

impl SortOrder {
    pub const ALL: [SortOrder; 2] = [SortOrder::ByDateAdded, SortOrder::ByName];

    pub fn label(&self) -> &'static str {
        match self {
            SortOrder::ByDateAdded => "Date Added",
            SortOrder::ByName => "Name",
        }
    }

    /// Stable in-place sort; equal keys keep storage order.
    pub fn sort(&self, books: &mut [Book]) {
        match self {
            SortOrder::ByDateAdded => books.sort_by(|a, b| b.added_at.cmp(&a.added_at)),
            SortOrder::ByName => {
                books.sort_by(|a, b| a.title.to_lowercase().cmp(&b.title.to_lowercase()))
            }
        }
    }

    pub fn sorted(&self, mut books: Vec<Book>) -> Vec<Book> {
        self.sort(&mut books);
        books
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSortOrder(pub String);

impl fmt::Display for UnknownSortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown sort order '{}' (expected 'date_added' or 'name')", self.0)
    }
}

impl std::error::Error for UnknownSortOrder {}

impl FromStr for SortOrder {
    type Err = UnknownSortOrder;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "date_added" | "date" | "by_date_added" => Ok(SortOrder::ByDateAdded),
            "name" | "title" | "by_name" => Ok(SortOrder::ByName),
            other => Err(UnknownSortOrder(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(id: BookId, title: &str, added_at: i64) -> Book {
        Book {
            id,
            added_at,
            ..Book::new(title, "Author", "2024", "")
        }
    }

    #[test]
    fn test_valid_book() {
        assert!(Book::new("Dune", "Frank Herbert", "1965", "").is_valid());
    }

    #[test]
    fn test_each_short_field_is_invalid() {
        assert_eq!(Book::new("A", "Author", "2024", "").invalid_fields(), vec!["title"]);
        assert_eq!(Book::new("Title", "B", "2024", "").invalid_fields(), vec!["author"]);
        assert_eq!(Book::new("Title", "Author", "9", "").invalid_fields(), vec!["year"]);
    }

    #[test]
    fn test_validation_trims_whitespace() {
        let padded = Book::new("  A  ", "Author", "2024", "");
        assert!(!padded.is_valid());

        let ok = Book::new(" AB ", " CD ", " 99 ", "");
        assert!(ok.is_valid());
    }

    #[test]
    fn test_notes_are_not_validated() {
        assert!(Book::new("Title", "Author", "2024", "").is_valid());
    }

    #[test]
    fn test_validation_counts_characters_not_bytes() {
        // One character, two bytes.
        assert!(!Book::new("é", "Author", "2024", "").is_valid());
    }

    #[test]
    fn test_matches_title_or_author_ignoring_case() {
        let b = Book::new("The Hobbit", "J. R. R. Tolkien", "1937", "");
        assert!(b.matches("hobbit"));
        assert!(b.matches("TOLKIEN"));
        assert!(!b.matches("dragon"));
    }

    #[test]
    fn test_sort_by_date_added_is_descending() {
        let books = vec![book(1, "a", 1000), book(2, "b", 2000), book(3, "c", 500)];
        let sorted = SortOrder::ByDateAdded.sorted(books);
        let ids: Vec<_> = sorted.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    #[test]
    fn test_sort_by_name_ignores_case() {
        let books = vec![book(1, "banana", 0), book(2, "Apple", 0), book(3, "cherry", 0)];
        let sorted = SortOrder::ByName.sorted(books);
        let titles: Vec<_> = sorted.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, vec!["Apple", "banana", "cherry"]);
    }

    #[test]
    fn test_sort_is_stable_on_ties() {
        let books = vec![book(1, "same", 7), book(2, "SAME", 7), book(3, "Same", 7)];
        let by_date = SortOrder::ByDateAdded.sorted(books.clone());
        let by_name = SortOrder::ByName.sorted(books);
        assert_eq!(by_date.iter().map(|b| b.id).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(by_name.iter().map(|b| b.id).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_sort_order_parses() {
        assert_eq!("name".parse::<SortOrder>(), Ok(SortOrder::ByName));
        assert_eq!("Date_Added".parse::<SortOrder>(), Ok(SortOrder::ByDateAdded));
        assert!("random".parse::<SortOrder>().is_err());
    }

    #[test]
    fn test_book_json_round_trip_defaults_notes() {
        let json = r#"{"id":4,"title":"Emma","author":"Jane Austen","year":"1815","added_at":12}"#;
        let b: Book = serde_json::from_str(json).unwrap();
        assert_eq!(b.notes, "");
        assert_eq!(b.id, 4);
    }
}
