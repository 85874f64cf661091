use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use super::{check_cancelled, Entity, Store};
use crate::domain::{Author, NewAuthor};
use crate::error::StoreError;

impl Store {
    #[instrument(fields(last_name = %author.last_name), skip(self, ctx, author))]
    pub async fn create_author(
        &self,
        ctx: &CancellationToken,
        author: NewAuthor,
    ) -> Result<Author, StoreError> {
        check_cancelled(ctx)?;
        let mut tables = self.tables.write().await;

        let author = Author::from_new(tables.authors.next_id(), author);
        tables.authors.insert(author.clone());
        self.persist(&tables).await?;

        info!(author_id = author.id, "Author created");
        Ok(author)
    }

    /// Replaces the author's fields. Books keep the copy they took earlier.
    #[instrument(skip(self, ctx, author))]
    pub async fn update_author(
        &self,
        ctx: &CancellationToken,
        id: u64,
        author: NewAuthor,
    ) -> Result<Author, StoreError> {
        check_cancelled(ctx)?;
        let mut tables = self.tables.write().await;

        if !tables.authors.contains(id) {
            debug!("Author not found for update");
            return Err(StoreError::NotFound {
                entity: Author::NAME,
                id,
            });
        }

        let author = Author::from_new(id, author);
        tables.authors.insert(author.clone());
        self.persist(&tables).await?;

        info!("Author updated");
        Ok(author)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::*;

    #[tokio::test]
    async fn update_keeps_identity_and_leaves_book_copies_alone() {
        let store = Store::in_memory();
        let ctx = CancellationToken::new();
        let author = author(&store, "Pratchett").await;
        let book = book(&store, author.id, "Mort", 9.0, 2).await;

        let updated = store
            .update_author(&ctx, author.id, NewAuthor::new("Terry", "Pratchett", "Discworld"))
            .await
            .unwrap();
        assert_eq!(updated.id, author.id);
        assert_eq!(updated.bio, "Discworld");

        let stored_book = store.get_book(&ctx, book.id).await.unwrap();
        assert_eq!(stored_book.author.bio, "Writes things.");
    }

    #[tokio::test]
    async fn deleting_an_author_keeps_their_books() {
        let store = Store::in_memory();
        let ctx = CancellationToken::new();
        let author = author(&store, "Woolf").await;
        let book = book(&store, author.id, "Orlando", 11.0, 1).await;

        store.delete_author(&ctx, author.id).await.unwrap();

        assert!(!store.author_exists(author.id).await);
        let stored_book = store.get_book(&ctx, book.id).await.unwrap();
        assert_eq!(stored_book.author.last_name, "Woolf");
    }

    #[tokio::test]
    async fn update_of_missing_author_is_not_found() {
        let store = Store::in_memory();
        let err = store
            .update_author(&CancellationToken::new(), 7, NewAuthor::new("A", "B", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "Author", id: 7 }));
    }
}
