pub mod request;
pub mod token_refresher;
