mod data;
mod error;
mod product_api_client;

pub use data::product::Product;
pub use error::Error;
pub use product_api_client::{ProductApiClient, ProductApiClientBuilder};
