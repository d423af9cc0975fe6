use serde::ser::SerializeStruct;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    pub method: String,
    pub params: Value,
    pub id: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JsonError {
    #[error("Parse error")]
    ParseError,
    #[error("Invalid request")]
    InvalidRequest,
    #[error("Method not found")]
    MethodNotFound,
    #[error("Invalid params")]
    InvalidParams,
    #[error("Internal error")]
    InternalError,
    /// The request never produced a JSON-RPC answer.
    #[error("transport error: {0}")]
    Transport(String),
    /// Server-defined error; avalanchego reports most failures this way.
    #[error("{message}")]
    Custom {
        code: i32,
        message: String,
        data: Option<Value>,
    },
}

impl JsonError {
    pub fn code(&self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError | Self::Transport(_) => -32603,
            Self::Custom { code, .. } => *code,
        }
    }

    pub fn data(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Custom { data, .. } => data.as_ref(),
            _ => None,
        }
    }
}

impl Serialize for JsonError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("JsonError", 3)?;
        state.serialize_field("code", &self.code())?;
        state.serialize_field("message", &self.to_string())?;

        if let Some(data) = self.data() {
            state.serialize_field("data", data)?;
        }

        state.end()
    }
}

impl<'de> Deserialize<'de> for JsonError {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Envelope {
            code: i32,
            #[serde(default)]
            message: String,
            data: Option<serde_json::Value>,
        }

        let err = Envelope::deserialize(deserializer)?;

        match err.code {
            -32700 => Ok(JsonError::ParseError),
            -32600 => Ok(JsonError::InvalidRequest),
            -32601 => Ok(JsonError::MethodNotFound),
            -32602 => Ok(JsonError::InvalidParams),
            code => Ok(JsonError::Custom {
                code,
                message: err.message,
                data: err.data,
            }),
        }
    }
}

pub type JsonResult<T> = Result<T, JsonError>;
