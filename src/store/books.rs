use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use super::{check_cancelled, Entity, Store, Tables};
use crate::domain::{Author, Book, NewBook, SearchCriteria, SortKey};
use crate::error::StoreError;

fn validate(book: &NewBook) -> Result<(), StoreError> {
    if !book.price.is_finite() || book.price < 0.0 {
        return Err(StoreError::Validation(format!(
            "price must be a non-negative number, got {}",
            book.price
        )));
    }
    Ok(())
}

/// Copies the referenced author out of the table.
fn resolve_author(tables: &Tables, author_id: u64) -> Result<Author, StoreError> {
    tables.authors.get(author_id).cloned().ok_or_else(|| {
        StoreError::ReferentialIntegrity(format!("author {author_id} does not exist"))
    })
}

impl Store {
    #[instrument(fields(title = %book.title, author_id = book.author_id), skip(self, ctx, book))]
    pub async fn create_book(
        &self,
        ctx: &CancellationToken,
        book: NewBook,
    ) -> Result<Book, StoreError> {
        check_cancelled(ctx)?;
        validate(&book)?;
        let mut tables = self.tables.write().await;

        let author = resolve_author(&tables, book.author_id)?;
        let book = Book::from_new(tables.books.next_id(), book, author);
        tables.books.insert(book.clone());
        self.persist(&tables).await?;

        info!(book_id = book.id, "Book created");
        Ok(book)
    }

    /// Replaces the book, taking a fresh copy of its author.
    #[instrument(fields(author_id = book.author_id), skip(self, ctx, book))]
    pub async fn update_book(
        &self,
        ctx: &CancellationToken,
        id: u64,
        book: NewBook,
    ) -> Result<Book, StoreError> {
        check_cancelled(ctx)?;
        validate(&book)?;
        let mut tables = self.tables.write().await;

        if !tables.books.contains(id) {
            debug!("Book not found for update");
            return Err(StoreError::NotFound {
                entity: Book::NAME,
                id,
            });
        }
        let author = resolve_author(&tables, book.author_id)?;

        let book = Book::from_new(id, book, author);
        tables.books.insert(book.clone());
        self.persist(&tables).await?;

        info!("Book updated");
        Ok(book)
    }

    #[instrument(skip(self, ctx))]
    pub async fn search_books(
        &self,
        ctx: &CancellationToken,
        criteria: &SearchCriteria,
    ) -> Result<Vec<Book>, StoreError> {
        check_cancelled(ctx)?;

        let title = criteria.title.to_lowercase();
        let author_words: Vec<String> = criteria
            .author
            .split_whitespace()
            .map(str::to_lowercase)
            .collect();

        let tables = self.tables.read().await;
        let mut results = Vec::new();
        for book in tables.books.values() {
            check_cancelled(ctx)?;

            if !title.is_empty() && !book.title.to_lowercase().contains(&title) {
                continue;
            }
            if !criteria.author.is_empty() && !matches_author(book, &author_words) {
                continue;
            }
            if !criteria.genre.is_empty() && !book.has_genre(&criteria.genre) {
                continue;
            }
            if criteria.min_price.is_some_and(|min| book.price < min) {
                continue;
            }
            if criteria.max_price.is_some_and(|max| book.price > max) {
                continue;
            }
            results.push(book.clone());
        }
        drop(tables);

        if let Some(key) = criteria.sort_by {
            match key {
                SortKey::Title => results.sort_by(|a, b| a.title.cmp(&b.title)),
                SortKey::Price => results.sort_by(|a, b| a.price.total_cmp(&b.price)),
            }
            if criteria.descending {
                results.reverse();
            }
        }

        debug!(matches = results.len(), "Book search finished");
        Ok(results)
    }
}

fn matches_author(book: &Book, words: &[String]) -> bool {
    let first = book.author.first_name.to_lowercase();
    let last = book.author.last_name.to_lowercase();
    words
        .iter()
        .any(|word| first.contains(word.as_str()) || last.contains(word.as_str()))
}
