//! qscale-backends — concrete collaborators for the controller.
//!
//! - [`RabbitMqManagement`] implements `QueueBackend` over the RabbitMQ
//!   management HTTP API (read-only queue inspection).
//! - [`CloudFoundryClient`] implements `PlatformClient` over the Cloud
//!   Foundry v3 API with a pre-issued bearer token.
//!
//! Both share one [`HttpClient`]: a hyper http1 connection per request,
//! TLS via rustls, and a per-request timeout.

pub mod cloudfoundry;
pub mod http;
pub mod rabbitmq;
pub mod tls;

pub use cloudfoundry::CloudFoundryClient;
pub use http::{HttpClient, HttpResponse};
pub use rabbitmq::RabbitMqManagement;
pub use tls::TlsConfig;
