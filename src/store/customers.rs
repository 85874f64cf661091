use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::{check_cancelled, Entity, Store, Tables};
use crate::auth;
use crate::domain::{Customer, CustomerPatch, NewCustomer};
use crate::error::StoreError;

fn email_taken(tables: &Tables, email: &str, except: Option<u64>) -> bool {
    tables
        .customers
        .values()
        .any(|c| Some(c.id) != except && c.email.eq_ignore_ascii_case(email))
}

impl Store {
    /// Registers a customer. The password is hashed before the write lock is
    /// taken and the plaintext is dropped.
    #[instrument(fields(customer_email = %customer.email), skip(self, ctx, customer))]
    pub async fn create_customer(
        &self,
        ctx: &CancellationToken,
        customer: NewCustomer,
    ) -> Result<Customer, StoreError> {
        check_cancelled(ctx)?;
        if customer.email.trim().is_empty() {
            return Err(StoreError::Validation("email is required".to_string()));
        }
        if customer.password.is_empty() {
            return Err(StoreError::Validation("password is required".to_string()));
        }

        let NewCustomer {
            name,
            email,
            password,
            address,
        } = customer;
        let password_hash = tokio::task::spawn_blocking(move || auth::hash_password(&password))
            .await
            .map_err(|e| StoreError::Persistence(format!("password hashing task failed: {e}")))?
            .map_err(|e| StoreError::Validation(format!("password could not be hashed: {e}")))?;

        check_cancelled(ctx)?;
        let mut tables = self.tables.write().await;

        if email_taken(&tables, &email, None) {
            warn!("Email already registered");
            return Err(StoreError::Conflict(format!("email {email} already exists")));
        }

        let customer = Customer {
            id: tables.customers.next_id(),
            name,
            email,
            password_hash,
            created_at: Utc::now(),
            address,
        };
        tables.customers.insert(customer.clone());
        self.persist(&tables).await?;

        info!(customer_id = customer.id, "Customer created");
        Ok(customer)
    }

    /// Merges the patch into the stored customer.
    #[instrument(skip(self, ctx, patch))]
    pub async fn update_customer(
        &self,
        ctx: &CancellationToken,
        id: u64,
        patch: CustomerPatch,
    ) -> Result<Customer, StoreError> {
        check_cancelled(ctx)?;
        let mut tables = self.tables.write().await;

        let Some(existing) = tables.customers.get(id) else {
            debug!("Customer not found for update");
            return Err(StoreError::NotFound {
                entity: Customer::NAME,
                id,
            });
        };
        let mut customer = existing.clone();

        if let Some(email) = patch.email.filter(|e| !e.trim().is_empty()) {
            if email_taken(&tables, &email, Some(id)) {
                warn!("Email already registered");
                return Err(StoreError::Conflict(format!("email {email} already exists")));
            }
            customer.email = email;
        }
        if let Some(name) = patch.name.filter(|n| !n.is_empty()) {
            customer.name = name;
        }
        if let Some(address) = patch.address {
            customer.address = address;
        }

        tables.customers.insert(customer.clone());
        self.persist(&tables).await?;

        info!("Customer updated");
        Ok(customer)
    }

    /// Looks a customer up by email and checks the password. Both failure
    /// modes return the same error.
    #[instrument(skip(self, ctx, password))]
    pub async fn authenticate_customer(
        &self,
        ctx: &CancellationToken,
        email: &str,
        password: &str,
    ) -> Result<Customer, StoreError> {
        check_cancelled(ctx)?;
        let customer = {
            let tables = self.tables.read().await;
            let found = tables
                .customers
                .values()
                .find(|c| c.email.eq_ignore_ascii_case(email))
                .cloned();
            found
        };

        let rejected = || StoreError::Validation("invalid email or password".to_string());
        let customer = customer.ok_or_else(rejected)?;

        let hash = customer.password_hash.clone();
        let password = password.to_string();
        let verified = tokio::task::spawn_blocking(move || auth::verify_password(&password, &hash))
            .await
            .map_err(|e| StoreError::Persistence(format!("password check task failed: {e}")))?;

        if verified {
            Ok(customer)
        } else {
            Err(rejected())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Address;
    use crate::store::test_support::*;

    #[tokio::test]
    async fn password_is_stored_hashed() {
        let store = Store::in_memory();
        let customer = customer(&store, "ada@example.com").await;

        assert_ne!(customer.password_hash, "hunter2");
        assert!(auth::verify_password("hunter2", &customer.password_hash));
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let store = Store::in_memory();
        customer(&store, "ada@example.com").await;

        let err = store
            .create_customer(
                &CancellationToken::new(),
                NewCustomer::new("Other Ada", "ADA@example.com", "pw"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.customers_count().await, 1);
    }

    #[tokio::test]
    async fn empty_password_is_rejected() {
        let store = Store::in_memory();
        let err = store
            .create_customer(
                &CancellationToken::new(),
                NewCustomer::new("No Password", "np@example.com", ""),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[tokio::test]
    async fn update_merges_only_given_fields() {
        let store = Store::in_memory();
        let ctx = CancellationToken::new();
        let original = customer(&store, "grace@example.com").await;
        customer(&store, "taken@example.com").await;

        let address = Address {
            street: "1 Navy Way".into(),
            city: "Arlington".into(),
            postal_code: "22202".into(),
            country: "US".into(),
        };
        let updated = store
            .update_customer(
                &ctx,
                original.id,
                CustomerPatch {
                    name: Some("Grace Hopper".into()),
                    address: Some(address.clone()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Grace Hopper");
        assert_eq!(updated.email, "grace@example.com");
        assert_eq!(updated.address, address);
        assert_eq!(updated.created_at, original.created_at);
        assert_eq!(updated.password_hash, original.password_hash);

        let err = store
            .update_customer(
                &ctx,
                original.id,
                CustomerPatch {
                    email: Some("taken@example.com".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn authentication_checks_the_hash() {
        let store = Store::in_memory();
        let ctx = CancellationToken::new();
        let registered = customer(&store, "linus@example.com").await;

        let found = store
            .authenticate_customer(&ctx, "linus@example.com", "hunter2")
            .await
            .unwrap();
        assert_eq!(found.id, registered.id);

        let wrong_password = store
            .authenticate_customer(&ctx, "linus@example.com", "nope")
            .await
            .unwrap_err();
        let unknown_email = store
            .authenticate_customer(&ctx, "who@example.com", "hunter2")
            .await
            .unwrap_err();
        assert_eq!(wrong_password, unknown_email);
    }
}
