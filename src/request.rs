//! Conversion request holder

/// Text to convert plus an identifier used only in error messages
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionRequest {
    text: String,
    id: String,
}

impl ConversionRequest {
    /// Create a request with an empty identifier
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            id: String::new(),
        }
    }

    /// Attach an identifier reported by errors raised for this text
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Split the request into its text buffer and identifier
    pub fn into_parts(self) -> (String, String) {
        (self.text, self.id)
    }
}
