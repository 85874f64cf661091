use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::Author;

/// Represents a book in the catalogue.
///
/// `author` is a copy of the referenced [`Author`] taken when the book was
/// created or last updated. Later edits to the author do not reach it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: u64,
    pub title: String,
    pub genres: BTreeSet<String>,
    pub price: f64,
    pub stock: u32,
    pub author: Author,
}

/// Payload for creating or replacing a book.
#[derive(Debug, Clone)]
pub struct NewBook {
    pub title: String,
    pub genres: BTreeSet<String>,
    pub price: f64,
    pub stock: u32,
    pub author_id: u64,
}

impl NewBook {
    pub fn new(title: impl Into<String>, author_id: u64, price: f64, stock: u32) -> Self {
        Self {
            title: title.into(),
            genres: BTreeSet::new(),
            price,
            stock,
            author_id,
        }
    }

    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.genres.insert(genre.into());
        self
    }
}

impl Book {
    pub(crate) fn from_new(id: u64, new: NewBook, author: Author) -> Self {
        Self {
            id,
            title: new.title,
            genres: new.genres,
            price: new.price,
            stock: new.stock,
            author,
        }
    }

    pub fn has_genre(&self, genre: &str) -> bool {
        self.genres.contains(genre)
    }
}
