use std::sync::{Arc, PoisonError, RwLock, Weak};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{DataAccessError, Result};

/// An in-memory listing whose rows can be read by position.
#[async_trait]
pub trait ListingHandle: Send + Sync {
    async fn read_row(
        &self,
        index: usize,
        relative_path: &str,
        allow_object_access: bool,
    ) -> Result<Value>;
}

/// Listings reachable by the id they got at registration.
///
/// The registry does not own its listings: a listing dropped by its creator
/// is reported as not found.
#[derive(Default)]
pub struct ListingRegistry {
    listings: RwLock<Vec<Weak<dyn ListingHandle>>>,
}

impl ListingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `listing` and returns its stable id.
    pub fn register(&self, listing: &Arc<dyn ListingHandle>) -> usize {
        let mut listings = self.listings.write().unwrap_or_else(PoisonError::into_inner);
        listings.push(Arc::downgrade(listing));
        listings.len() - 1
    }

    /// Registers the listing built for the next id, so it can know its own id.
    pub fn register_with<L, F>(&self, build: F) -> Arc<L>
    where
        L: ListingHandle + 'static,
        F: FnOnce(usize) -> Arc<L>,
    {
        let mut listings = self.listings.write().unwrap_or_else(PoisonError::into_inner);
        let listing = build(listings.len());
        let handle: Arc<dyn ListingHandle> = listing.clone();
        listings.push(Arc::downgrade(&handle));
        listing
    }

    pub fn get(&self, id: usize) -> Result<Arc<dyn ListingHandle>> {
        self.listings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .and_then(Weak::upgrade)
            .ok_or(DataAccessError::ListingNotFound(id))
    }

    pub fn len(&self) -> usize {
        self.listings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FixedListing(Value);

    #[async_trait]
    impl ListingHandle for FixedListing {
        async fn read_row(&self, _: usize, _: &str, _: bool) -> Result<Value> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn ids_follow_registration_order() {
        let registry = ListingRegistry::new();
        let first: Arc<dyn ListingHandle> = Arc::new(FixedListing(json!("first")));
        let second: Arc<dyn ListingHandle> = Arc::new(FixedListing(json!("second")));

        assert_eq!(registry.register(&first), 0);
        assert_eq!(registry.register(&second), 1);
        assert_eq!(registry.len(), 2);

        let value = registry.get(1).unwrap().read_row(0, "x", false).await.unwrap();
        assert_eq!(value, json!("second"));
    }

    #[test]
    fn builder_receives_next_id() {
        let registry = ListingRegistry::new();
        let first: Arc<dyn ListingHandle> = Arc::new(FixedListing(Value::Null));
        registry.register(&first);

        let built = registry.register_with(|id| Arc::new(FixedListing(json!(id))));
        assert_eq!(built.0, json!(1));
        assert!(registry.get(1).is_ok());
    }

    #[test]
    fn unknown_or_dropped_listing_is_not_found() {
        let registry = ListingRegistry::new();
        assert!(matches!(registry.get(0), Err(DataAccessError::ListingNotFound(0))));

        let listing: Arc<dyn ListingHandle> = Arc::new(FixedListing(Value::Null));
        let id = registry.register(&listing);
        drop(listing);
        assert!(matches!(registry.get(id), Err(DataAccessError::ListingNotFound(_))));
        assert_eq!(registry.len(), 1);
    }
}
