//! Async client for a remote deployment resource API.
//!
//! # Overview
//! Create, fetch and delete deployments (image, replica count, labels,
//! ports) on a remote orchestration service over its JSON REST contract.
//!
//! # Design
//! - `Client` holds the connection settings and wires one
//!   `DeploymentService` at build time.
//! - `DeploymentService` splits each operation into `build_*` (produces an
//!   `HttpRequest`) and `parse_*` (consumes an `HttpResponse`); only the
//!   shared `Transport` touches the network.
//! - Every operation takes a `Context`; its cancellation or deadline aborts
//!   the in-flight request with `Error::Network`.
//! - Failures are one closed `Error` enum. Server rejections are classified
//!   from their JSON envelope into `ResponseError` or `InvalidResource`.
//!
//! ```no_run
//! use kubeclient::{Client, Context, Deployment};
//!
//! # async fn run() -> Result<(), kubeclient::Error> {
//! let client = Client::builder().url("http://localhost:3333").build()?;
//! let deployment = Deployment::new("nginx", 1).with_port("http", 80);
//! let created = client.deployments().create(&Context::background(), &deployment).await?;
//! assert_eq!(created.id, deployment.id);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod context;
pub mod deployment;
pub mod error;
pub mod http;
pub mod types;

pub use client::{Client, ClientBuilder};
pub use context::{CancelHandle, Cancelled, Context};
pub use deployment::DeploymentService;
pub use error::{ConfigError, Error, InvalidResource, NetworkError, ResponseError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, ReqwestTransport, Transport};
pub use types::{Deployment, Port};
