use std::any::Any;

use serde::ser::{Serialize, SerializeStruct as _, Serializer};
use thiserror::Error;

/// Message used when a fault carries nothing readable.
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Why a handler operation failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    /// No updater has been assigned yet; nothing was called.
    #[error("Updater not initialized")]
    NotInitialized,

    /// The collaborator reported or raised a fault.
    #[error("{0}")]
    CollaboratorFault(String),
}

impl HandlerError {
    pub fn from_fault(err: &anyhow::Error) -> Self {
        Self::fault_message(err.to_string())
    }

    /// Panic payloads are only readable when they are strings.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = match payload.downcast::<String>() {
            Ok(message) => *message,
            Err(payload) => match payload.downcast_ref::<&str>() {
                Some(message) => message.to_string(),
                None => String::new(),
            },
        };
        Self::fault_message(message)
    }

    pub fn into_failure<T>(self) -> IpcResult<T> {
        IpcResult::Failure(self.to_string())
    }

    fn fault_message(message: String) -> Self {
        if message.trim().is_empty() {
            Self::CollaboratorFault(UNKNOWN_ERROR.to_string())
        } else {
            Self::CollaboratorFault(message)
        }
    }
}

/// Uniform outcome returned across the IPC boundary.
///
/// Serializes as `{ "success": true, "value": .. }` or
/// `{ "success": false, "error": ".." }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IpcResult<T> {
    Success(T),
    Failure(String),
}

impl<T> IpcResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, IpcResult::Success(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            IpcResult::Success(value) => Some(value),
            IpcResult::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            IpcResult::Success(_) => None,
            IpcResult::Failure(error) => Some(error),
        }
    }

    pub fn into_result(self) -> Result<T, String> {
        match self {
            IpcResult::Success(value) => Ok(value),
            IpcResult::Failure(error) => Err(error),
        }
    }
}

impl<T> From<Result<T, HandlerError>> for IpcResult<T> {
    fn from(result: Result<T, HandlerError>) -> Self {
        match result {
            Ok(value) => IpcResult::Success(value),
            Err(err) => IpcResult::Failure(err.to_string()),
        }
    }
}

impl<T: Serialize> Serialize for IpcResult<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("IpcResult", 2)?;
        match self {
            IpcResult::Success(value) => {
                state.serialize_field("success", &true)?;
                state.serialize_field("value", value)?;
            }
            IpcResult::Failure(error) => {
                state.serialize_field("success", &false)?;
                state.serialize_field("error", error)?;
            }
        }
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_shape() {
        let ok: IpcResult<&str> = IpcResult::Success("pong");
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            serde_json::json!({ "success": true, "value": "pong" })
        );

        let unit: IpcResult<()> = IpcResult::Success(());
        assert_eq!(
            serde_json::to_value(&unit).unwrap(),
            serde_json::json!({ "success": true, "value": null })
        );

        let failed: IpcResult<()> = HandlerError::NotInitialized.into_failure();
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            serde_json::json!({ "success": false, "error": "Updater not initialized" })
        );
    }

    #[test]
    fn fault_messages() {
        let err = anyhow::anyhow!("disk full");
        assert_eq!(HandlerError::from_fault(&err).to_string(), "disk full");

        let blank = anyhow::anyhow!("");
        assert_eq!(HandlerError::from_fault(&blank).to_string(), UNKNOWN_ERROR);

        // Only the outermost context is surfaced
        let wrapped = anyhow::anyhow!("socket closed").context("Download failed");
        assert_eq!(HandlerError::from_fault(&wrapped).to_string(), "Download failed");
    }

    #[test]
    fn panic_payloads() {
        let literal: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(HandlerError::from_panic(literal).to_string(), "boom");

        let owned: Box<dyn Any + Send> = Box::new(String::from("owned boom"));
        assert_eq!(HandlerError::from_panic(owned).to_string(), "owned boom");

        let opaque: Box<dyn Any + Send> = Box::new(42_u32);
        assert_eq!(HandlerError::from_panic(opaque).to_string(), UNKNOWN_ERROR);
    }

    #[test]
    fn accessors() {
        let ok: IpcResult<u8> = IpcResult::Success(7);
        assert!(ok.is_success());
        assert_eq!(ok.value(), Some(&7));
        assert_eq!(ok.error(), None);
        assert_eq!(ok.into_result(), Ok(7));

        let failed: IpcResult<u8> = IpcResult::Failure("nope".into());
        assert!(!failed.is_success());
        assert_eq!(failed.error(), Some("nope"));
        assert_eq!(failed.into_result(), Err("nope".to_string()));
    }
}
