use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::RepositoryError;
use super::value_objects::ShippingAddress;

#[async_trait]
pub trait AddressRepository: Send + Sync {
    async fn find_address(&self, address_id: Uuid) -> Result<Option<ShippingAddress>, RepositoryError>;

    /// Default first, then oldest first.
    async fn find_addresses(&self, user_id: Uuid) -> Result<Vec<ShippingAddress>, RepositoryError>;

    async fn insert_address(&self, address: ShippingAddress) -> Result<(), RepositoryError>;

    async fn update_address(&self, address: ShippingAddress) -> Result<(), RepositoryError>;

    /// Returns whether a row was deleted.
    async fn delete_address(&self, address_id: Uuid) -> Result<bool, RepositoryError>;

    /// Clear every default of `user_id` and set `address_id` as the one
    /// default, atomically. Returns `false` if the address is unknown.
    async fn set_default(&self, user_id: Uuid, address_id: Uuid) -> Result<bool, RepositoryError>;
}
