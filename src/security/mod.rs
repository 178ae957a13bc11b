pub mod credential;

pub use credential::ApiKey;
