pub mod listing_registry;
pub mod token_store;
