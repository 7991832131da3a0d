use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::WorkflowError;

/// Payload schema version accepted by this build
pub const CURRENT_PAYLOAD_VERSION: u16 = 1;

pub const MAX_SUBJECT_LEN: usize = 200;

/// Reference to a file held by external storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub name: String,
    pub uri: String,
}

/// Document content carried by a case. The workflow core never interprets it
/// beyond validation at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CasePayload {
    pub schema_version: u16,
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_no: Option<String>,
    #[serde(default)]
    pub details: BTreeMap<String, String>,
    #[serde(default)]
    pub attachments: Vec<AttachmentRef>,
}

impl CasePayload {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            schema_version: CURRENT_PAYLOAD_VERSION,
            subject: subject.into(),
            reference_no: None,
            details: BTreeMap::new(),
            attachments: Vec::new(),
        }
    }

    pub fn with_reference(mut self, reference_no: impl Into<String>) -> Self {
        self.reference_no = Some(reference_no.into());
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn with_attachment(mut self, name: impl Into<String>, uri: impl Into<String>) -> Self {
        self.attachments.push(AttachmentRef {
            name: name.into(),
            uri: uri.into(),
        });
        self
    }

    pub fn validate(&self) -> Result<(), WorkflowError> {
        if self.schema_version != CURRENT_PAYLOAD_VERSION {
            return Err(WorkflowError::Validation(format!(
                "unsupported payload schema version {} (expected {})",
                self.schema_version, CURRENT_PAYLOAD_VERSION
            )));
        }

        let subject = self.subject.trim();
        if subject.is_empty() {
            return Err(WorkflowError::Validation("payload subject is required".to_string()));
        }
        if subject.chars().count() > MAX_SUBJECT_LEN {
            return Err(WorkflowError::Validation(format!(
                "payload subject exceeds {MAX_SUBJECT_LEN} characters"
            )));
        }

        if let Some(attachment) = self
            .attachments
            .iter()
            .find(|a| a.name.trim().is_empty() || a.uri.trim().is_empty())
        {
            return Err(WorkflowError::Validation(format!(
                "attachment reference is incomplete: {attachment:?}"
            )));
        }

        Ok(())
    }
}
