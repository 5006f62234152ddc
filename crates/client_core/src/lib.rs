use std::sync::Arc;

use reqwest::Client;
use shared::{
    domain::{Record, Resource, ResourceKind},
    protocol::Query,
};

pub mod controller;
pub mod error;
pub mod filters;
pub mod selection;
pub mod transport;

pub use controller::{FetchPhase, ListController, ListEvent, ListSnapshot};
pub use error::{ControllerError, DeleteFailure, MutationKind, TransportError};
pub use transport::{FilePart, FormPayload, HttpResourceApi, ResourceApi, ResourceBody};

pub type RecordController = ListController<HttpResourceApi<Record>>;

/// Entry point for the admin screens: one HTTP connection pool shared by a
/// controller per collection.
#[derive(Clone)]
pub struct AdminClient {
    http: Client,
    base_url: String,
}

impl AdminClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    pub fn api<R: Resource>(&self, resource: &str) -> Result<HttpResourceApi<R>, TransportError> {
        HttpResourceApi::with_client(self.http.clone(), &self.base_url, resource)
    }

    /// Controller for one of the built-in collections, untyped rows.
    pub fn records(
        &self,
        kind: ResourceKind,
        query: Query,
    ) -> Result<Arc<RecordController>, TransportError> {
        Ok(ListController::with_query(self.api(kind.path())?, query))
    }
}
