use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::domain::{Author, Book, Customer, Order};

/// Trait that any record kept in a [`Table`] must implement.
pub trait Entity: Clone + Send + Sync + 'static {
    /// Human readable entity name used in errors and logs.
    const NAME: &'static str;

    fn id(&self) -> u64;
}

impl Entity for Book {
    const NAME: &'static str = "Book";

    fn id(&self) -> u64 {
        self.id
    }
}

impl Entity for Author {
    const NAME: &'static str = "Author";

    fn id(&self) -> u64 {
        self.id
    }
}

impl Entity for Customer {
    const NAME: &'static str = "Customer";

    fn id(&self) -> u64 {
        self.id
    }
}

impl Entity for Order {
    const NAME: &'static str = "Order";

    fn id(&self) -> u64 {
        self.id
    }
}

/// Rows of one entity keyed by identity.
///
/// `next_id` only moves forward, so an identity freed by a delete is never
/// handed out again for the lifetime of the table.
#[derive(Debug, Clone)]
pub(crate) struct Table<T> {
    rows: BTreeMap<u64, T>,
    next_id: u64,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: 0,
        }
    }
}

impl<T: Entity> Table<T> {
    fn from_rows(rows: BTreeMap<u64, T>) -> Self {
        let next_id = rows.keys().next_back().map_or(0, |id| id + 1);
        Self { rows, next_id }
    }

    /// Identity the next inserted row should carry.
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    pub fn insert(&mut self, row: T) {
        let id = row.id();
        self.next_id = self.next_id.max(id + 1);
        self.rows.insert(id, row);
    }

    pub fn get(&self, id: u64) -> Option<&T> {
        self.rows.get(&id)
    }

    pub fn get_mut(&mut self, id: u64) -> Option<&mut T> {
        self.rows.get_mut(&id)
    }

    pub fn remove(&mut self, id: u64) -> Option<T> {
        self.rows.remove(&id)
    }

    pub fn contains(&self, id: u64) -> bool {
        self.rows.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.rows.values()
    }
}

impl<T: Serialize> Serialize for Table<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.rows.serialize(serializer)
    }
}

impl<'de, T: Entity + Deserialize<'de>> Deserialize<'de> for Table<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let rows = BTreeMap::<u64, T>::deserialize(deserializer)?;
        Ok(Self::from_rows(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Author;

    fn author(id: u64) -> Author {
        Author {
            id,
            first_name: "Ursula".into(),
            last_name: "Le Guin".into(),
            bio: String::new(),
        }
    }

    #[test]
    fn identities_are_not_reused_after_removal() {
        let mut table = Table::<Author>::default();
        assert_eq!(table.next_id(), 0);

        for _ in 0..3 {
            let id = table.next_id();
            table.insert(author(id));
        }
        table.remove(2);
        assert_eq!(table.next_id(), 3);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn loaded_table_continues_after_highest_identity() {
        let json = r#"{"4": {"id": 4, "first_name": "A", "last_name": "B", "bio": ""},
                       "9": {"id": 9, "first_name": "C", "last_name": "D", "bio": ""}}"#;
        let table: Table<Author> = serde_json::from_str(json).unwrap();
        assert_eq!(table.next_id(), 10);
        assert!(table.contains(4));
        assert!(!table.contains(5));
    }
}
