pub mod auth;

pub use auth::{api_key_middleware, ApiKeys, API_KEY_HEADER};
