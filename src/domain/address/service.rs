use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use super::errors::AddressError;
use super::repository::AddressRepository;
use super::value_objects::{AddressInput, ShippingAddress};

#[derive(Clone)]
pub struct AddressService {
    addresses: Arc<dyn AddressRepository>,
}

impl AddressService {
    pub fn new(addresses: Arc<dyn AddressRepository>) -> Self {
        Self { addresses }
    }

    pub async fn list_addresses(&self, user_id: Uuid) -> Result<Vec<ShippingAddress>, AddressError> {
        Ok(self.addresses.find_addresses(user_id).await?)
    }

    pub async fn get_address(&self, address_id: Uuid, user_id: Uuid) -> Result<ShippingAddress, AddressError> {
        let address = self
            .addresses
            .find_address(address_id)
            .await?
            .ok_or(AddressError::NotFound(address_id))?;

        if address.user_id != user_id {
            return Err(AddressError::Forbidden);
        }

        Ok(address)
    }

    /// The first address a user saves becomes their default.
    pub async fn add_address(&self, user_id: Uuid, input: AddressInput) -> Result<ShippingAddress, AddressError> {
        if let Some(field) = input.missing_field() {
            return Err(AddressError::MissingField(field));
        }

        let first = self.addresses.find_addresses(user_id).await?.is_empty();
        let make_default = input.make_default || first;

        let address = ShippingAddress {
            id: Uuid::now_v7(),
            user_id,
            recipient: input.recipient,
            line1: input.line1,
            line2: input.line2,
            city: input.city,
            region: input.region,
            postal_code: input.postal_code,
            country: input.country,
            is_default: false,
            created_at: Utc::now(),
        };
        self.addresses.insert_address(address.clone()).await?;

        if make_default {
            return self.set_default(address.id, user_id).await;
        }

        tracing::debug!(user_id = %user_id, address_id = %address.id, "Address added");
        Ok(address)
    }

    pub async fn update_address(
        &self,
        address_id: Uuid,
        user_id: Uuid,
        input: AddressInput,
    ) -> Result<ShippingAddress, AddressError> {
        let existing = self.get_address(address_id, user_id).await?;

        if let Some(field) = input.missing_field() {
            return Err(AddressError::MissingField(field));
        }

        let updated = ShippingAddress {
            recipient: input.recipient,
            line1: input.line1,
            line2: input.line2,
            city: input.city,
            region: input.region,
            postal_code: input.postal_code,
            country: input.country,
            ..existing
        };
        self.addresses.update_address(updated.clone()).await?;

        if input.make_default && !updated.is_default {
            return self.set_default(address_id, user_id).await;
        }

        Ok(updated)
    }

    pub async fn remove_address(&self, address_id: Uuid, user_id: Uuid) -> Result<(), AddressError> {
        self.get_address(address_id, user_id).await?;

        if !self.addresses.delete_address(address_id).await? {
            return Err(AddressError::NotFound(address_id));
        }

        tracing::debug!(user_id = %user_id, address_id = %address_id, "Address removed");
        Ok(())
    }

    pub async fn set_default(&self, address_id: Uuid, user_id: Uuid) -> Result<ShippingAddress, AddressError> {
        self.get_address(address_id, user_id).await?;

        if !self.addresses.set_default(user_id, address_id).await? {
            return Err(AddressError::NotFound(address_id));
        }

        tracing::info!(user_id = %user_id, address_id = %address_id, "Default address changed");
        self.get_address(address_id, user_id).await
    }

    pub async fn default_address(&self, user_id: Uuid) -> Result<Option<ShippingAddress>, AddressError> {
        Ok(self
            .addresses
            .find_addresses(user_id)
            .await?
            .into_iter()
            .find(|address| address.is_default))
    }
}
