use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::RepositoryError;
use super::value_objects::{CartItem, ProductListing};

#[async_trait]
pub trait CartRepository: Send + Sync {
    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<CartItem>, RepositoryError>;

    async fn find_item(&self, item_id: Uuid) -> Result<Option<CartItem>, RepositoryError>;

    async fn find_by_user_and_product(
        &self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<CartItem>, RepositoryError>;

    async fn insert(&self, item: CartItem) -> Result<(), RepositoryError>;

    async fn update(&self, item: CartItem) -> Result<(), RepositoryError>;

    /// Returns whether a row was deleted.
    async fn delete(&self, item_id: Uuid) -> Result<bool, RepositoryError>;

    /// Delete every item of a user, returning how many went.
    async fn clear(&self, user_id: Uuid) -> Result<u64, RepositoryError>;
}

/// Read-only product lookup used when adding to a cart.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn find_product(&self, product_id: Uuid) -> Result<Option<ProductListing>, RepositoryError>;
}
