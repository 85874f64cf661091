//! In-memory entity store with snapshot persistence.
//!
//! All four tables live behind one [`RwLock`]. Mutations hold the write
//! guard until the snapshot has been written, reads share the read guard.
//! Order creation touches books, customers and orders together, so the
//! tables are never locked separately.

mod authors;
mod books;
mod customers;
mod orders;
mod snapshot;
mod stats;
mod table;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::domain::{Author, Book, Customer, Order};
use crate::error::StoreError;

pub(crate) use snapshot::write_atomic;
pub use table::Entity;
use table::Table;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Tables {
    pub books: Table<Book>,
    pub authors: Table<Author>,
    pub customers: Table<Customer>,
    pub orders: Table<Order>,
}

pub struct Store {
    tables: RwLock<Tables>,
    snapshot_path: Option<PathBuf>,
}

impl Store {
    /// Store without a snapshot file. Mutations are kept in memory only.
    pub fn in_memory() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            snapshot_path: None,
        }
    }

    /// Loads the snapshot at `path`, or starts empty if it does not exist yet.
    /// Later mutations are saved to the same path.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let tables = snapshot::load(&path).await?;
        info!(
            path = %path.display(),
            books = tables.books.len(),
            authors = tables.authors.len(),
            customers = tables.customers.len(),
            orders = tables.orders.len(),
            "Store opened"
        );
        Ok(Self {
            tables: RwLock::new(tables),
            snapshot_path: Some(path),
        })
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    /// Writes the current state to the snapshot file.
    pub async fn save_to_file(&self) -> Result<(), StoreError> {
        let tables = self.tables.write().await;
        self.persist(&tables).await
    }

    /// Called with the write guard held. Must not touch `self.tables`.
    async fn persist(&self, tables: &Tables) -> Result<(), StoreError> {
        match &self.snapshot_path {
            Some(path) => snapshot::save(path, tables).await,
            None => Ok(()),
        }
    }
}

pub(crate) fn check_cancelled(ctx: &CancellationToken) -> Result<(), StoreError> {
    if ctx.is_cancelled() {
        Err(StoreError::Cancelled)
    } else {
        Ok(())
    }
}

/// Generate the read-only accessors shared by every table.
macro_rules! impl_table_reads {
    ($table:ident, $entity:ty, $name:ident) => {
        paste::paste! {
            impl Store {
                #[tracing::instrument(skip(self, ctx))]
                pub async fn [<get_ $name>](
                    &self,
                    ctx: &CancellationToken,
                    id: u64,
                ) -> Result<$entity, StoreError> {
                    check_cancelled(ctx)?;
                    let tables = self.tables.read().await;
                    tables.$table.get(id).cloned().ok_or(StoreError::NotFound {
                        entity: <$entity as Entity>::NAME,
                        id,
                    })
                }

                #[tracing::instrument(skip(self, ctx))]
                pub async fn [<list_ $table>](
                    &self,
                    ctx: &CancellationToken,
                ) -> Result<Vec<$entity>, StoreError> {
                    check_cancelled(ctx)?;
                    let tables = self.tables.read().await;
                    Ok(tables.$table.values().cloned().collect())
                }

                pub async fn [<$name _exists>](&self, id: u64) -> bool {
                    self.tables.read().await.$table.contains(id)
                }

                pub async fn [<$table _count>](&self) -> usize {
                    self.tables.read().await.$table.len()
                }
            }
        }
    };
}

/// Generate a non-cascading delete for a table.
macro_rules! impl_table_delete {
    ($table:ident, $entity:ty, $name:ident) => {
        paste::paste! {
            impl Store {
                #[tracing::instrument(skip(self, ctx))]
                pub async fn [<delete_ $name>](
                    &self,
                    ctx: &CancellationToken,
                    id: u64,
                ) -> Result<(), StoreError> {
                    check_cancelled(ctx)?;
                    let mut tables = self.tables.write().await;
                    if tables.$table.remove(id).is_none() {
                        return Err(StoreError::NotFound {
                            entity: <$entity as Entity>::NAME,
                            id,
                        });
                    }
                    self.persist(&tables).await?;
                    tracing::info!(entity = <$entity as Entity>::NAME, "Row deleted");
                    Ok(())
                }
            }
        }
    };
}

impl_table_reads!(books, Book, book);
impl_table_reads!(authors, Author, author);
impl_table_reads!(customers, Customer, customer);
impl_table_reads!(orders, Order, order);

impl_table_delete!(books, Book, book);
impl_table_delete!(authors, Author, author);
impl_table_delete!(customers, Customer, customer);
