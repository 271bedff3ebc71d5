//! UI/backend events and error modeling for the dashboard controller.

use client_core::{CommandError, EndReason, SyncEvent};
use shared::{
    error::ValidationError,
    protocol::{ConceptAck, Owner, OwnerAck},
};

use crate::controller::forms::SubmissionId;

pub enum UiEvent {
    Info(String),
    ConceptSubmitted {
        submission: SubmissionId,
        ack: ConceptAck,
    },
    ConceptRejected {
        submission: SubmissionId,
        error: UiError,
    },
    OwnerLoaded(Owner),
    OwnerUpdated {
        submission: SubmissionId,
        ack: OwnerAck,
    },
    OwnerRejected {
        submission: SubmissionId,
        error: UiError,
    },
    Error(UiError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorCategory {
    Transport,
    Validation,
    Backend,
    Decode,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorContext {
    BackendStartup,
    ConceptForm,
    OwnerForm,
    LiveSync,
    General,
}

#[derive(Debug, Clone)]
pub struct UiError {
    category: UiErrorCategory,
    context: UiErrorContext,
    message: String,
}

impl UiError {
    pub fn from_command(context: UiErrorContext, err: &CommandError) -> Self {
        let category = match err {
            CommandError::Validation(_) => UiErrorCategory::Validation,
            CommandError::Request { .. } => UiErrorCategory::Transport,
            CommandError::Status { .. } => UiErrorCategory::Backend,
            CommandError::Decode { .. } => UiErrorCategory::Decode,
        };
        Self {
            category,
            context,
            message: err.to_string(),
        }
    }

    /// A draft rejected before any request was made.
    pub fn from_validation(context: UiErrorContext, err: &ValidationError) -> Self {
        Self {
            category: UiErrorCategory::Validation,
            context,
            message: err.to_string(),
        }
    }

    /// Only failures are mapped; `Applied` is not an error.
    pub fn from_sync(event: &SyncEvent) -> Option<Self> {
        match event {
            SyncEvent::Applied { .. } => None,
            SyncEvent::DecodeFailed { collection, error } => Some(Self {
                category: UiErrorCategory::Decode,
                context: UiErrorContext::LiveSync,
                message: format!("dropped a malformed {collection} update: {error}"),
            }),
            SyncEvent::Ended {
                collection,
                reason: EndReason::TransportFailed(err),
            } => Some(Self {
                category: UiErrorCategory::Transport,
                context: UiErrorContext::LiveSync,
                message: format!("{collection} stopped updating: {err}"),
            }),
            SyncEvent::Ended {
                collection,
                reason: EndReason::RemoteClosed,
            } => Some(Self {
                category: UiErrorCategory::Transport,
                context: UiErrorContext::LiveSync,
                message: format!("{collection} channel was closed by the backend"),
            }),
        }
    }

    pub fn from_message(context: UiErrorContext, message: impl Into<String>) -> Self {
        let message = message.into();
        let message_lower = message.to_ascii_lowercase();
        let category = if message_lower.contains("must not be empty")
            || message_lower.contains("invalid draft")
        {
            UiErrorCategory::Validation
        } else if message_lower.contains("decode") || message_lower.contains("malformed") {
            UiErrorCategory::Decode
        } else if message_lower.contains("timeout")
            || message_lower.contains("connection")
            || message_lower.contains("network")
            || message_lower.contains("transport")
            || message_lower.contains("unavailable")
            || message_lower.contains("disconnect")
        {
            UiErrorCategory::Transport
        } else {
            UiErrorCategory::Unknown
        };

        Self {
            category,
            context,
            message,
        }
    }

    pub fn category(&self) -> UiErrorCategory {
        self.category
    }

    pub fn context(&self) -> UiErrorContext {
        self.context
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Short line for the status bar, prefixed by where the failure happened.
    pub fn summary(&self) -> String {
        let prefix = match self.context {
            UiErrorContext::BackendStartup => "Startup",
            UiErrorContext::ConceptForm => "Concept",
            UiErrorContext::OwnerForm => "Owner",
            UiErrorContext::LiveSync => "Live sync",
            UiErrorContext::General => "Error",
        };
        format!("{prefix}: {}", self.message)
    }
}
