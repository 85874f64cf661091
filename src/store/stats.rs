use std::collections::{BTreeMap, BTreeSet};

use tokio_util::sync::CancellationToken;
use tracing::instrument;

use super::{check_cancelled, Store};
use crate::domain::Book;
use crate::error::StoreError;

/// Read-only probes over the whole store. They take the read lock and check
/// the context at every row they visit.
impl Store {
    /// Number of books carrying each genre.
    #[instrument(skip(self, ctx))]
    pub async fn books_by_genre(
        &self,
        ctx: &CancellationToken,
    ) -> Result<BTreeMap<String, usize>, StoreError> {
        check_cancelled(ctx)?;
        let tables = self.tables.read().await;
        let mut counts = BTreeMap::new();
        for book in tables.books.values() {
            check_cancelled(ctx)?;
            for genre in &book.genres {
                *counts.entry(genre.clone()).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    pub async fn books_in_genre(
        &self,
        ctx: &CancellationToken,
        genre: &str,
    ) -> Result<Vec<Book>, StoreError> {
        self.filter_books(ctx, |b| b.has_genre(genre)).await
    }

    pub async fn out_of_stock_books(&self, ctx: &CancellationToken) -> Result<Vec<Book>, StoreError> {
        self.filter_books(ctx, |b| b.stock == 0).await
    }

    /// Number of books per author identity, from the copies held by books.
    pub async fn books_per_author(
        &self,
        ctx: &CancellationToken,
    ) -> Result<BTreeMap<u64, usize>, StoreError> {
        check_cancelled(ctx)?;
        let tables = self.tables.read().await;
        let mut counts = BTreeMap::new();
        for book in tables.books.values() {
            check_cancelled(ctx)?;
            *counts.entry(book.author.id).or_insert(0) += 1;
        }
        Ok(counts)
    }

    /// Number of orders, in any status, containing at least one book by each
    /// author.
    #[instrument(skip(self, ctx))]
    pub async fn orders_per_author(
        &self,
        ctx: &CancellationToken,
    ) -> Result<BTreeMap<u64, usize>, StoreError> {
        check_cancelled(ctx)?;
        let tables = self.tables.read().await;
        let mut counts = BTreeMap::new();
        for order in tables.orders.values() {
            check_cancelled(ctx)?;
            let authors: BTreeSet<u64> = order.items.iter().map(|i| i.book.author.id).collect();
            for author_id in authors {
                *counts.entry(author_id).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn filter_books(
        &self,
        ctx: &CancellationToken,
        keep: impl Fn(&Book) -> bool,
    ) -> Result<Vec<Book>, StoreError> {
        check_cancelled(ctx)?;
        let tables = self.tables.read().await;
        let mut books = Vec::new();
        for book in tables.books.values() {
            check_cancelled(ctx)?;
            if keep(book) {
                books.push(book.clone());
            }
        }
        Ok(books)
    }
}
