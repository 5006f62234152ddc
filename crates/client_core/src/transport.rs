//! Paged-list HTTP collaborator consumed by the list controller.

use std::marker::PhantomData;

use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client, RequestBuilder, Response,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use shared::{
    domain::{Resource, ResourceId},
    error::{ApiError, ErrorCode},
    protocol::{Envelope, ListResponse, PageResult, Query},
};
use tracing::debug;
use url::Url;

use crate::error::TransportError;

/// The four verbs a resource collection must expose.
#[async_trait]
pub trait ResourceApi: Send + Sync {
    type Item: Resource;

    /// Collection name used in logs and error messages.
    fn resource(&self) -> &str;

    async fn list(&self, query: &Query) -> Result<PageResult<Self::Item>, TransportError>;
    async fn create(&self, body: ResourceBody) -> Result<Self::Item, TransportError>;
    async fn update(
        &self,
        id: &ResourceId,
        body: ResourceBody,
    ) -> Result<Self::Item, TransportError>;
    async fn delete(&self, id: &ResourceId) -> Result<(), TransportError>;
}

/// Request body for create/update. Records with uploads go out as
/// multipart form-data, everything else as JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceBody {
    Json(Value),
    Form(FormPayload),
}

impl ResourceBody {
    pub fn json<T: Serialize>(value: &T) -> Result<Self, TransportError> {
        serde_json::to_value(value)
            .map(ResourceBody::Json)
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormPayload {
    pub fields: Vec<(String, String)>,
    pub files: Vec<FilePart>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub field: String,
    pub filename: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl FormPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn file(
        mut self,
        field: impl Into<String>,
        filename: impl Into<String>,
        mime_type: Option<String>,
        bytes: Vec<u8>,
    ) -> Self {
        self.files.push(FilePart {
            field: field.into(),
            filename: filename.into(),
            mime_type,
            bytes,
        });
        self
    }

    fn into_form(self) -> Result<Form, TransportError> {
        let mut form = Form::new();
        for (name, value) in self.fields {
            form = form.text(name, value);
        }
        for file in self.files {
            let mut part = Part::bytes(file.bytes).file_name(file.filename);
            if let Some(mime_type) = file.mime_type {
                part = part
                    .mime_str(&mime_type)
                    .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
            }
            form = form.part(file.field, part);
        }
        Ok(form)
    }
}

/// `ResourceApi` over `{base}/api/{resource}`.
pub struct HttpResourceApi<R> {
    http: Client,
    base_url: Url,
    resource: String,
    _item: PhantomData<fn() -> R>,
}

impl<R> HttpResourceApi<R> {
    pub fn new(base_url: &str, resource: impl Into<String>) -> Result<Self, TransportError> {
        Self::with_client(Client::new(), base_url, resource)
    }

    pub fn with_client(
        http: Client,
        base_url: &str,
        resource: impl Into<String>,
    ) -> Result<Self, TransportError> {
        let base_url = Url::parse(base_url.trim())
            .map_err(|e| TransportError::InvalidRequest(format!("bad base url '{base_url}': {e}")))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(TransportError::InvalidRequest(format!(
                "base url '{base_url}' must use http or https"
            )));
        }
        let resource = resource.into().trim_matches('/').to_string();
        if resource.is_empty() {
            return Err(TransportError::InvalidRequest(
                "resource path must not be empty".to_string(),
            ));
        }
        Ok(Self {
            http,
            base_url,
            resource,
            _item: PhantomData,
        })
    }

    fn endpoint(&self, id: Option<&ResourceId>) -> Result<Url, TransportError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                TransportError::InvalidRequest(format!(
                    "base url '{}' cannot carry a path",
                    self.base_url
                ))
            })?;
            segments.pop_if_empty().push("api");
            for part in self.resource.split('/') {
                segments.push(part);
            }
            if let Some(id) = id {
                segments.push(id.as_str());
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl<R: Resource> ResourceApi for HttpResourceApi<R> {
    type Item = R;

    fn resource(&self) -> &str {
        &self.resource
    }

    async fn list(&self, query: &Query) -> Result<PageResult<R>, TransportError> {
        let url = self.endpoint(None)?;
        debug!(resource = %self.resource, page = query.page, "GET {url}");
        let response = self.http.get(url).query(&query.to_params()).send().await?;
        let body: ListResponse<R> = read_json(response).await?;
        Ok(body.data.normalized(query.limit))
    }

    async fn create(&self, body: ResourceBody) -> Result<R, TransportError> {
        let url = self.endpoint(None)?;
        debug!(resource = %self.resource, "POST {url}");
        let response = with_body(self.http.post(url), body)?.send().await?;
        let created: Envelope<R> = read_json(response).await?;
        Ok(created.data)
    }

    async fn update(&self, id: &ResourceId, body: ResourceBody) -> Result<R, TransportError> {
        let url = self.endpoint(Some(id))?;
        debug!(resource = %self.resource, %id, "PUT {url}");
        let response = with_body(self.http.put(url), body)?.send().await?;
        let updated: Envelope<R> = read_json(response).await?;
        Ok(updated.data)
    }

    async fn delete(&self, id: &ResourceId) -> Result<(), TransportError> {
        let url = self.endpoint(Some(id))?;
        debug!(resource = %self.resource, %id, "DELETE {url}");
        let response = self.http.delete(url).send().await?;
        check_status(response).await?;
        Ok(())
    }
}

fn with_body(builder: RequestBuilder, body: ResourceBody) -> Result<RequestBuilder, TransportError> {
    Ok(match body {
        ResourceBody::Json(value) => builder.json(&value),
        ResourceBody::Form(payload) => builder.multipart(payload.into_form()?),
    })
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, TransportError> {
    let response = check_status(response).await?;
    response
        .json::<T>()
        .await
        .map_err(|e| TransportError::Decode(e.to_string()))
}

async fn check_status(response: Response) -> Result<Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiError>(&body)
        .ok()
        .map(|payload| payload.message)
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
        });

    Err(TransportError::Api {
        code: ErrorCode::from_status(status.as_u16()),
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
