// src/gateway/mod.rs

pub mod error;
pub mod fetch;
pub mod policy;
pub mod transport;

pub use error::FetchError;
pub use fetch::FetchGateway;
pub use policy::RetryPolicy;
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
