use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response wrapper every collide endpoint returns.
///
/// The harness only reads it; unknown members are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub code: Option<Value>,
}

impl Envelope {
    pub fn from_value(value: &Value) -> Option<Self> {
        Envelope::deserialize(value).ok()
    }

    /// Trimmed message, `None` when absent or blank
    pub fn message(&self) -> Option<&str> {
        self.message
            .as_deref()
            .map(str::trim)
            .filter(|message| !message.is_empty())
    }

    pub fn data_at(&self, pointer: &str) -> Option<&Value> {
        self.data.as_ref()?.pointer(pointer)
    }
}
