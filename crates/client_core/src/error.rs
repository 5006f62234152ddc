use std::fmt;

use shared::{domain::ResourceId, error::ErrorCode};
use thiserror::Error;

/// Failure talking to the paged-list backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("{message}")]
    Api {
        code: ErrorCode,
        status: u16,
        message: String,
    },
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected response body: {0}")]
    Decode(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl TransportError {
    /// Text meant for the operator. Backend `message` payloads come through
    /// untouched.
    pub fn message(&self) -> String {
        match self {
            TransportError::Api { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            TransportError::Decode(err.to_string())
        } else if err.is_builder() {
            TransportError::InvalidRequest(err.to_string())
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MutationKind::Create => "create",
            MutationKind::Update => "update",
            MutationKind::Delete => "delete",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteFailure {
    pub id: ResourceId,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    /// The list query failed; the previously loaded page stays visible.
    #[error("failed to load {resource}: {message}")]
    Fetch { resource: String, message: String },
    #[error("failed to {action} {resource}: {message}")]
    Mutation {
        resource: String,
        action: MutationKind,
        message: String,
    },
    /// Some deletes of a bulk removal failed. Successful ones are not undone.
    #[error(
        "deleted {} of {} {resource}; {}",
        .deleted.len(),
        attempted(.deleted, .failures),
        describe_failures(.failures)
    )]
    BulkDelete {
        resource: String,
        deleted: Vec<ResourceId>,
        failures: Vec<DeleteFailure>,
    },
}

impl ControllerError {
    /// Message for an error banner.
    pub fn message(&self) -> String {
        match self {
            ControllerError::Fetch { message, .. } | ControllerError::Mutation { message, .. } => {
                message.clone()
            }
            ControllerError::BulkDelete { failures, .. } => describe_failures(failures),
        }
    }

    pub fn is_fetch(&self) -> bool {
        matches!(self, ControllerError::Fetch { .. })
    }
}

fn attempted(deleted: &[ResourceId], failures: &[DeleteFailure]) -> usize {
    deleted.len() + failures.len()
}

fn describe_failures(failures: &[DeleteFailure]) -> String {
    failures
        .iter()
        .map(|failure| format!("{}: {}", failure.id, failure.message))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bulk_delete_names_each_failed_id() {
        let err = ControllerError::BulkDelete {
            resource: "meals".into(),
            deleted: vec![ResourceId::new("m1")],
            failures: vec![DeleteFailure {
                id: ResourceId::new("m2"),
                message: "Meal is referenced by a plan".into(),
            }],
        };
        assert_eq!(
            err.to_string(),
            "deleted 1 of 2 meals; m2: Meal is referenced by a plan"
        );
        assert_eq!(err.message(), "m2: Meal is referenced by a plan");
    }

    #[test]
    fn api_message_is_passed_through_verbatim() {
        let err = TransportError::Api {
            code: ErrorCode::Validation,
            status: 422,
            message: "Name is required".into(),
        };
        assert_eq!(err.message(), "Name is required");
    }
}
