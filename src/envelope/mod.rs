//! Response envelope - the uniform result of every tool call.
//!
//! Every dispatch produces exactly one `ResponseEnvelope`. Its JSON form is
//! fixed: `{"success":bool,"message":string,"data"?:any,"requiresUserAction"?:bool}`,
//! with absent optional fields omitted rather than serialized as `null`.
//! Images travel beside the envelope as separate MCP content items and never
//! appear in its JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Prefix of every envelope produced from an error that escaped a handler.
pub const EXECUTION_FAILED_PREFIX: &str = "Tool execution failed: ";

/// One base64-encoded image, rendered as an MCP `image` content item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageContent {
    pub data: String,
    pub mime_type: String,
}

impl ImageContent {
    pub fn new(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    /// MCP content item: `{"type":"image","data":..,"mimeType":..}`.
    pub fn to_content(&self) -> Value {
        serde_json::json!({
            "type": "image",
            "data": self.data,
            "mimeType": self.mime_type,
        })
    }
}

/// Canonical success/failure shape returned to the calling assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub success: bool,

    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_user_action: Option<bool>,

    #[serde(skip)]
    pub images: Vec<ImageContent>,
}

impl ResponseEnvelope {
    /// Successful outcome without a payload.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
            requires_user_action: None,
            images: Vec::new(),
        }
    }

    /// Failed outcome without a payload.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            requires_user_action: None,
            images: Vec::new(),
        }
    }

    /// Envelope for an error that escaped a handler.
    pub fn from_error(err: impl std::fmt::Display) -> Self {
        Self::failure(format!("{}{}", EXECUTION_FAILED_PREFIX, err))
    }

    /// Attach a structured payload.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Attach images shown to the user ahead of the envelope text.
    pub fn with_images(mut self, images: Vec<ImageContent>) -> Self {
        self.images = images;
        self
    }

    /// Mark that the user must act (confirm, open a link) before continuing.
    pub fn requiring_user_action(mut self) -> Self {
        self.requires_user_action = Some(true);
        self
    }

    /// True when the caller is expected to involve the user.
    pub fn needs_user_action(&self) -> bool {
        self.requires_user_action.unwrap_or(false)
    }

    /// Serialize to the text body of a tool-call response.
    pub fn to_text(&self) -> String {
        // A struct of bool/String/Value cannot fail to serialize.
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                "{{\"success\":{},\"message\":{:?}}}",
                self.success, self.message
            )
        })
    }
}
