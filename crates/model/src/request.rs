use crate::GenerationOptions;

/// A request to be sent to the model provider.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelRequest {
    /// The input messages, in conversation order.
    pub messages: Vec<ModelMessage>,
    /// Sampling parameters passed through to the provider.
    pub options: GenerationOptions,
}

/// The author of a [`ModelMessage`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// The system instructions.
    System,
    /// The user side of the conversation.
    User,
    /// The model side of the conversation.
    Assistant,
}

/// A complete message.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ModelMessage {
    /// The system instructions.
    System(String),
    /// A user input text.
    User(String),
    /// An assistant text.
    Assistant(String),
}

impl ModelMessage {
    /// Returns the role of this message.
    #[inline]
    pub fn role(&self) -> Role {
        match self {
            ModelMessage::System(_) => Role::System,
            ModelMessage::User(_) => Role::User,
            ModelMessage::Assistant(_) => Role::Assistant,
        }
    }

    /// Returns the text content of this message.
    #[inline]
    pub fn content(&self) -> &str {
        match self {
            ModelMessage::System(content)
            | ModelMessage::User(content)
            | ModelMessage::Assistant(content) => content,
        }
    }
}
