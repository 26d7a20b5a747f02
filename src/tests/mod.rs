pub mod common;
mod create_with_token_retry;
