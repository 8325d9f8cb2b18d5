pub mod cache;
pub mod client;
pub mod dto;
pub mod error;

pub use client::{
    ApiClient,
    ApiConfig,
};
pub use error::ApiError;
pub use reqwest::StatusCode;

pub type Result<T, E = ApiError> = std::result::Result<T, E>;
