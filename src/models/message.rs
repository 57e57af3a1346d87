use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

/// Hint for the input control the surface should render for the next reply.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    Text,
    Phone,
    Number,
}

/// One transcript entry. Immutable once appended; the transcript is an
/// append-only sequence of these.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub text: String,
    pub sender: Sender,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub is_multi_select: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_kind: Option<InputKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_placeholder: Option<String>,
}

impl Message {
    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::Bot,
            options: None,
            is_multi_select: false,
            input_kind: None,
            input_placeholder: None,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::User,
            options: None,
            is_multi_select: false,
            input_kind: None,
            input_placeholder: None,
        }
    }

    pub fn with_options(mut self, options: Vec<String>) -> Self {
        self.options = Some(options);
        self
    }

    pub fn multi_select(mut self) -> Self {
        self.is_multi_select = true;
        self
    }

    pub fn with_input(mut self, kind: InputKind, placeholder: &str) -> Self {
        self.input_kind = Some(kind);
        self.input_placeholder = Some(placeholder.to_string());
        self
    }
}
