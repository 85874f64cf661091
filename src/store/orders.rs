use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use super::{check_cancelled, Entity, Store, Tables};
use crate::domain::{Book, LineItem, NewOrder, Order, OrderStatus};
use crate::error::StoreError;

/// Loads an order that is still `created`, the only state that may move.
fn pending_order(tables: &Tables, id: u64) -> Result<&Order, StoreError> {
    let order = tables.orders.get(id).ok_or(StoreError::NotFound {
        entity: Order::NAME,
        id,
    })?;
    if order.status != OrderStatus::Created {
        warn!(status = %order.status, "Order is no longer pending");
        return Err(StoreError::InvalidState {
            id,
            status: order.status,
        });
    }
    Ok(order)
}

impl Store {
    /// Places an order and reserves its stock.
    ///
    /// Every line is checked against the stock left after the earlier lines
    /// before any book is touched, so a failing line leaves the store as it
    /// was. The write lock is held from the first check until the snapshot
    /// has been written.
    #[instrument(
        fields(customer_id = order.customer_id, lines = order.items.len()),
        skip(self, ctx, order)
    )]
    pub async fn create_order(
        &self,
        ctx: &CancellationToken,
        order: NewOrder,
    ) -> Result<Order, StoreError> {
        check_cancelled(ctx)?;
        if order.items.is_empty() {
            return Err(StoreError::Validation("order has no items".to_string()));
        }
        if let Some(line) = order.items.iter().find(|line| line.quantity == 0) {
            return Err(StoreError::Validation(format!(
                "quantity for book {} must be positive",
                line.book_id
            )));
        }

        let mut tables = self.tables.write().await;
        check_cancelled(ctx)?;

        if !tables.customers.contains(order.customer_id) {
            error!("Customer not found");
            return Err(StoreError::ReferentialIntegrity(format!(
                "customer {} does not exist",
                order.customer_id
            )));
        }

        // Step 1: check every line against what is left for its book
        let mut remaining: HashMap<u64, u32> = HashMap::new();
        for line in &order.items {
            check_cancelled(ctx)?;
            let book = tables.books.get(line.book_id).ok_or(StoreError::NotFound {
                entity: Book::NAME,
                id: line.book_id,
            })?;
            let available = remaining.entry(line.book_id).or_insert(book.stock);
            if line.quantity > *available {
                warn!(book_id = line.book_id, requested = line.quantity, available = *available, "Insufficient stock");
                return Err(StoreError::InsufficientStock {
                    book_id: line.book_id,
                    requested: line.quantity,
                    available: *available,
                });
            }
            *available -= line.quantity;
        }

        // Step 2: reserve
        let mut items = Vec::with_capacity(order.items.len());
        let mut total_price = 0.0;
        for line in order.items {
            let book = tables.books.get_mut(line.book_id).ok_or(StoreError::NotFound {
                entity: Book::NAME,
                id: line.book_id,
            })?;
            book.stock -= line.quantity;
            total_price += book.price * f64::from(line.quantity);
            items.push(LineItem {
                book_id: line.book_id,
                quantity: line.quantity,
                book: book.clone(),
            });
        }

        // Step 3: record
        let order = Order {
            id: tables.orders.next_id(),
            customer_id: order.customer_id,
            items,
            total_price,
            status: OrderStatus::Created,
            created_at: Utc::now(),
        };
        tables.orders.insert(order.clone());
        self.persist(&tables).await?;

        info!(order_id = order.id, total = order.total_price, "Order created");
        Ok(order)
    }

    #[instrument(skip(self, ctx))]
    pub async fn complete_order(
        &self,
        ctx: &CancellationToken,
        id: u64,
    ) -> Result<Order, StoreError> {
        check_cancelled(ctx)?;
        let mut tables = self.tables.write().await;

        pending_order(&tables, id)?;
        let order = tables.orders.get_mut(id).ok_or(StoreError::NotFound {
            entity: Order::NAME,
            id,
        })?;
        order.status = OrderStatus::Completed;
        let order = order.clone();
        self.persist(&tables).await?;

        info!("Order completed");
        Ok(order)
    }

    /// Cancels a pending order and puts its reserved quantities back on the
    /// shelf. Lines whose book has since been deleted have nowhere to go.
    #[instrument(skip(self, ctx))]
    pub async fn cancel_order(
        &self,
        ctx: &CancellationToken,
        id: u64,
    ) -> Result<Order, StoreError> {
        check_cancelled(ctx)?;
        let mut tables = self.tables.write().await;

        pending_order(&tables, id)?;
        let Tables { books, orders, .. } = &mut *tables;
        let order = orders.get_mut(id).ok_or(StoreError::NotFound {
            entity: Order::NAME,
            id,
        })?;

        for item in &order.items {
            match books.get_mut(item.book_id) {
                Some(book) => book.stock = book.stock.saturating_add(item.quantity),
                None => warn!(book_id = item.book_id, "Book was deleted, reservation dropped"),
            }
        }
        order.status = OrderStatus::Cancelled;
        let order = order.clone();
        self.persist(&tables).await?;

        info!("Order cancelled");
        Ok(order)
    }

    #[instrument(skip(self, ctx))]
    pub async fn search_orders_by_status(
        &self,
        ctx: &CancellationToken,
        status: OrderStatus,
    ) -> Result<Vec<Order>, StoreError> {
        check_cancelled(ctx)?;
        let tables = self.tables.read().await;
        let mut matches = Vec::new();
        for order in tables.orders.values() {
            check_cancelled(ctx)?;
            if order.status == status {
                matches.push(order.clone());
            }
        }
        Ok(matches)
    }

    /// Orders created within `[start, end]`, compared at whole-second
    /// precision so an order placed during the `end` second is included.
    #[instrument(skip(self, ctx))]
    pub async fn orders_in_time_range(
        &self,
        ctx: &CancellationToken,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Order>, StoreError> {
        check_cancelled(ctx)?;
        let (start, end) = (start.timestamp(), end.timestamp());
        let tables = self.tables.read().await;
        let mut matches = Vec::new();
        for order in tables.orders.values() {
            check_cancelled(ctx)?;
            let created = order.created_at.timestamp();
            if created >= start && created <= end {
                matches.push(order.clone());
            }
        }
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use super::*;
    use crate::store::test_support::*;

    struct Fixture {
        store: Store,
        ctx: CancellationToken,
        customer_id: u64,
        cheap: Book,
        dear: Book,
    }

    async fn fixture() -> Fixture {
        let store = Store::in_memory();
        let author = author(&store, "Borges").await;
        let cheap = book(&store, author.id, "Ficciones", 10.0, 5).await;
        let dear = book(&store, author.id, "El Aleph", 20.0, 2).await;
        let customer = customer(&store, "buyer@example.com").await;
        Fixture {
            store,
            ctx: CancellationToken::new(),
            customer_id: customer.id,
            cheap,
            dear,
        }
    }

    async fn stock(f: &Fixture, id: u64) -> u32 {
        f.store.get_book(&f.ctx, id).await.unwrap().stock
    }

    #[tokio::test]
    async fn order_reserves_stock_and_prices_at_order_time() {
        let f = fixture().await;
        let order = f
            .store
            .create_order(
                &f.ctx,
                NewOrder::new(f.customer_id).line(f.cheap.id, 3).line(f.dear.id, 1),
            )
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Created);
        assert_eq!(order.total_price, 3.0 * 10.0 + 20.0);
        assert_eq!(stock(&f, f.cheap.id).await, 2);
        assert_eq!(stock(&f, f.dear.id).await, 1);
        assert_eq!(order.items[0].book.stock, 2);
        assert_eq!(order.items[0].book.title, "Ficciones");
    }

    #[tokio::test]
    async fn insufficient_line_rolls_back_every_line() {
        let f = fixture().await;
        let err = f
            .store
            .create_order(
                &f.ctx,
                NewOrder::new(f.customer_id).line(f.cheap.id, 1).line(f.dear.id, 3),
            )
            .await
            .unwrap_err();

        assert_eq!(
            err,
            StoreError::InsufficientStock {
                book_id: f.dear.id,
                requested: 3,
                available: 2
            }
        );
        assert_eq!(stock(&f, f.cheap.id).await, 5);
        assert_eq!(stock(&f, f.dear.id).await, 2);
        assert_eq!(f.store.orders_count().await, 0);
    }

    #[tokio::test]
    async fn repeated_lines_for_one_book_share_its_stock() {
        let f = fixture().await;
        let err = f
            .store
            .create_order(
                &f.ctx,
                NewOrder::new(f.customer_id).line(f.dear.id, 2).line(f.dear.id, 1),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::InsufficientStock { available: 0, .. }));
        assert_eq!(stock(&f, f.dear.id).await, 2);
    }

    #[tokio::test]
    async fn unknown_references_are_rejected() {
        let f = fixture().await;

        let err = f
            .store
            .create_order(&f.ctx, NewOrder::new(999).line(f.cheap.id, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ReferentialIntegrity(_)));

        let err = f
            .store
            .create_order(
                &f.ctx,
                NewOrder::new(f.customer_id).line(f.cheap.id, 1).line(404, 1),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "Book", id: 404 }));
        assert_eq!(stock(&f, f.cheap.id).await, 5);

        let err = f
            .store
            .create_order(&f.ctx, NewOrder::new(f.customer_id).line(f.cheap.id, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[tokio::test]
    async fn cancel_restores_stock_and_complete_does_not_touch_it() {
        let f = fixture().await;
        let first = f
            .store
            .create_order(&f.ctx, NewOrder::new(f.customer_id).line(f.cheap.id, 4))
            .await
            .unwrap();
        let second = f
            .store
            .create_order(&f.ctx, NewOrder::new(f.customer_id).line(f.cheap.id, 1))
            .await
            .unwrap();
        assert_eq!(stock(&f, f.cheap.id).await, 0);

        let cancelled = f.store.cancel_order(&f.ctx, first.id).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(stock(&f, f.cheap.id).await, 4);

        let completed = f.store.complete_order(&f.ctx, second.id).await.unwrap();
        assert_eq!(completed.status, OrderStatus::Completed);
        assert_eq!(stock(&f, f.cheap.id).await, 4);
    }

    #[tokio::test]
    async fn terminal_orders_cannot_move() {
        let f = fixture().await;
        let order = f
            .store
            .create_order(&f.ctx, NewOrder::new(f.customer_id).line(f.dear.id, 1))
            .await
            .unwrap();
        f.store.complete_order(&f.ctx, order.id).await.unwrap();
        let before = f.store.get_order(&f.ctx, order.id).await.unwrap();

        let err = f.store.cancel_order(&f.ctx, order.id).await.unwrap_err();
        assert_eq!(
            err,
            StoreError::InvalidState {
                id: order.id,
                status: OrderStatus::Completed
            }
        );
        let err = f.store.complete_order(&f.ctx, order.id).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidState { .. }));

        assert_eq!(f.store.get_order(&f.ctx, order.id).await.unwrap(), before);
        assert_eq!(stock(&f, f.dear.id).await, 1);

        let err = f.store.complete_order(&f.ctx, 77).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "Order", id: 77 }));
    }

    #[tokio::test]
    async fn cancelling_after_book_deletion_skips_that_line() {
        let f = fixture().await;
        let order = f
            .store
            .create_order(
                &f.ctx,
                NewOrder::new(f.customer_id).line(f.cheap.id, 2).line(f.dear.id, 1),
            )
            .await
            .unwrap();
        f.store.delete_book(&f.ctx, f.dear.id).await.unwrap();

        f.store.cancel_order(&f.ctx, order.id).await.unwrap();
        assert_eq!(stock(&f, f.cheap.id).await, 5);
        assert!(!f.store.book_exists(f.dear.id).await);
    }

    #[tokio::test]
    async fn status_and_time_range_filters() {
        let f = fixture().await;
        let before = Utc::now() - Duration::seconds(1);
        let kept = f
            .store
            .create_order(&f.ctx, NewOrder::new(f.customer_id).line(f.cheap.id, 1))
            .await
            .unwrap();
        let dropped = f
            .store
            .create_order(&f.ctx, NewOrder::new(f.customer_id).line(f.cheap.id, 1))
            .await
            .unwrap();
        f.store.cancel_order(&f.ctx, dropped.id).await.unwrap();

        let created = f
            .store
            .search_orders_by_status(&f.ctx, OrderStatus::Created)
            .await
            .unwrap();
        assert_eq!(created.iter().map(|o| o.id).collect::<Vec<_>>(), vec![kept.id]);

        let all = f
            .store
            .orders_in_time_range(&f.ctx, before, Utc::now())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let exact = f
            .store
            .orders_in_time_range(&f.ctx, kept.created_at, kept.created_at)
            .await
            .unwrap();
        assert!(exact.iter().any(|o| o.id == kept.id));

        let none = f
            .store
            .orders_in_time_range(&f.ctx, before - Duration::hours(2), before)
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn time_range_includes_the_whole_end_second() {
        let f = fixture().await;
        let order = f
            .store
            .create_order(&f.ctx, NewOrder::new(f.customer_id).line(f.cheap.id, 1))
            .await
            .unwrap();
        let second = DateTime::from_timestamp(order.created_at.timestamp(), 0).unwrap();

        let found = f
            .store
            .orders_in_time_range(&f.ctx, second, second)
            .await
            .unwrap();
        assert_eq!(found.iter().map(|o| o.id).collect::<Vec<_>>(), vec![order.id]);
    }

    #[tokio::test]
    async fn order_filters_honour_cancellation() {
        let f = fixture().await;
        f.store
            .create_order(&f.ctx, NewOrder::new(f.customer_id).line(f.cheap.id, 1))
            .await
            .unwrap();
        let cancelled = CancellationToken::new();
        cancelled.cancel();

        assert_eq!(
            f.store
                .search_orders_by_status(&cancelled, OrderStatus::Created)
                .await,
            Err(StoreError::Cancelled)
        );
        assert_eq!(
            f.store
                .orders_in_time_range(&cancelled, Utc::now() - Duration::hours(1), Utc::now())
                .await,
            Err(StoreError::Cancelled)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_orders_for_the_last_copy() {
        let store = Arc::new(Store::in_memory());
        let author = author(&store, "Calvino").await;
        let last = book(&store, author.id, "Invisible Cities", 15.0, 1).await;
        let alice = customer(&store, "alice@example.com").await;
        let bob = customer(&store, "bob@example.com").await;
        let book_id = last.id;

        let attempts = [alice.id, bob.id].map(|customer_id| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .create_order(
                        &CancellationToken::new(),
                        NewOrder::new(customer_id).line(book_id, 1),
                    )
                    .await
            })
        });

        let mut won = 0;
        let mut lost = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(_) => won += 1,
                Err(StoreError::InsufficientStock { available: 0, .. }) => lost += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!((won, lost), (1, 1));

        let ctx = CancellationToken::new();
        assert_eq!(store.get_book(&ctx, book_id).await.unwrap().stock, 0);
        assert_eq!(store.orders_count().await, 1);
    }
}
