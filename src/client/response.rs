//! Decoded API payloads
//!
//! An `ApiResponse` wraps the JSON body of a successful request (or a loaded
//! fixture). Payloads are always a JSON object or a JSON array.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors produced when a body cannot be turned into an `ApiResponse`
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The body is not valid JSON
    #[error("Malformed JSON payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The body is valid JSON but neither an object nor an array
    #[error("Expected a JSON object or array, got {0}")]
    UnexpectedShape(&'static str),
}

/// Immutable wrapper around a decoded API payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct ApiResponse {
    data: Value,
}

impl ApiResponse {
    /// Creates a response from an already decoded value
    ///
    /// Fails with `DecodeError::UnexpectedShape` for scalars and `null`.
    pub fn new(data: Value) -> Result<Self, DecodeError> {
        match data {
            Value::Object(_) | Value::Array(_) => Ok(Self { data }),
            Value::Null => Err(DecodeError::UnexpectedShape("null")),
            Value::Bool(_) => Err(DecodeError::UnexpectedShape("boolean")),
            Value::Number(_) => Err(DecodeError::UnexpectedShape("number")),
            Value::String(_) => Err(DecodeError::UnexpectedShape("string")),
        }
    }

    /// Decodes a raw response body
    pub fn from_slice(body: &[u8]) -> Result<Self, DecodeError> {
        let data: Value = serde_json::from_slice(body)?;
        Self::new(data)
    }

    /// The decoded payload
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Looks up a top-level field when the payload is an object
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Whether the payload is a keyed mapping (as opposed to a sequence)
    pub fn is_object(&self) -> bool {
        self.data.is_object()
    }

    /// Consumes the response, returning the payload
    pub fn into_data(self) -> Value {
        self.data
    }

    /// Deserializes the payload into a typed structure
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, DecodeError> {
        Ok(T::deserialize(&self.data)?)
    }
}

impl TryFrom<Value> for ApiResponse {
    type Error = DecodeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ApiResponse> for Value {
    fn from(response: ApiResponse) -> Self {
        response.data
    }
}
