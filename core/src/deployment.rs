//! Deployment resource service.
//!
//! # Design
//! Each operation is split into a `build_*` method that produces an
//! `HttpRequest` and a `parse_*` method that consumes an `HttpResponse`. The
//! async operation in between issues exactly one request through the shared
//! transport, raced against the caller's context. No retries, no backoff.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use uuid::Uuid;

use crate::context::Context;
use crate::error::{Error, InvalidResource, ResponseError};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport};
use crate::types::Deployment;

const STATUS_NO_CONTENT: u16 = 204;
const STATUS_BAD_REQUEST: u16 = 400;

/// Typed create/get/delete over `{base_url}/deployments`.
#[derive(Debug, Clone)]
pub struct DeploymentService {
    transport: Arc<dyn Transport>,
    base_url: String,
    timeout: Duration,
}

impl DeploymentService {
    /// `timeout` becomes the default deadline of every call; a caller
    /// context with an earlier deadline still wins.
    pub fn new(transport: Arc<dyn Transport>, base_url: &str, timeout: Duration) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn create(&self, ctx: &Context, deployment: &Deployment) -> Result<Deployment, Error> {
        let request = self.build_create(deployment)?;
        let response = self.execute(ctx, request).await?;
        self.parse_create(response)
    }

    pub async fn get(&self, ctx: &Context, id: Uuid) -> Result<Deployment, Error> {
        let response = self.execute(ctx, self.build_get(id)).await?;
        self.parse_get(response)
    }

    pub async fn delete(&self, ctx: &Context, id: Uuid) -> Result<(), Error> {
        let response = self.execute(ctx, self.build_delete(id)).await?;
        self.parse_delete(response)
    }

    pub fn build_create(&self, deployment: &Deployment) -> Result<HttpRequest, Error> {
        let body = serde_json::to_string(deployment).map_err(Error::Encode)?;
        Ok(HttpRequest {
            method: HttpMethod::Post,
            url: format!("{}/deployments", self.base_url),
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: Some(body),
        })
    }

    pub fn build_get(&self, id: Uuid) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            url: format!("{}/deployments/{id}", self.base_url),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn build_delete(&self, id: Uuid) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Delete,
            url: format!("{}/deployments/{id}", self.base_url),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn parse_create(&self, response: HttpResponse) -> Result<Deployment, Error> {
        if response.status == STATUS_BAD_REQUEST {
            return Err(InvalidResource::from_bad_request(&response).into());
        }
        if !response.is_success() {
            return Err(ResponseError::from_response(&response).into());
        }
        decode(&response)
    }

    pub fn parse_get(&self, response: HttpResponse) -> Result<Deployment, Error> {
        if !response.is_success() {
            return Err(ResponseError::from_response(&response).into());
        }
        decode(&response)
    }

    pub fn parse_delete(&self, response: HttpResponse) -> Result<(), Error> {
        if response.status != STATUS_NO_CONTENT {
            return Err(ResponseError::from_response(&response).into());
        }
        Ok(())
    }

    async fn execute(&self, ctx: &Context, request: HttpRequest) -> Result<HttpResponse, Error> {
        let ctx = ctx.clone().with_timeout(self.timeout);
        if let Some(cause) = ctx.err() {
            return Err(cause.into());
        }

        debug!("{} {}", request.method, request.url);
        tokio::select! {
            biased;
            cause = ctx.done() => Err(cause.into()),
            result = self.transport.execute(request) => Ok(result?),
        }
    }
}

fn decode(response: &HttpResponse) -> Result<Deployment, Error> {
    serde_json::from_str(&response.body).map_err(Error::Decode)
}
