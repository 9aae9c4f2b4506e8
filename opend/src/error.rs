use thiserror::Error;

#[derive(Error, Debug)]
pub enum OpendError {
    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("canister rejected call (code {code}): {message}")]
    Rejected { code: u32, message: String },

    /// An update method returned something other than `"Success"`.
    #[error("{0}")]
    ActionFailed(String),

    #[error("Minting failed: Insufficient cycles. Top up the canister.")]
    InsufficientCycles,

    #[error("invalid principal: {0}")]
    InvalidPrincipal(String),

    #[error("identity error: {0}")]
    Identity(String),

    #[error("auth callback error: {0}")]
    Callback(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("not authenticated")]
    NotAuthenticated,

    #[error("another action is already in progress")]
    Busy,

    #[error("validation error: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, OpendError>;

/// Map an update-method result string to `Ok(())` or [`OpendError::ActionFailed`].
pub fn expect_success(result: String) -> Result<()> {
    if result == crate::SUCCESS {
        Ok(())
    } else {
        Err(OpendError::ActionFailed(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expect_success_ok() {
        assert!(expect_success("Success".into()).is_ok());
    }

    #[test]
    fn test_expect_success_surfaces_message_verbatim() {
        let err = expect_success("Insufficient balance".into()).unwrap_err();
        assert_eq!(err.to_string(), "Insufficient balance");
    }

    #[test]
    fn test_expect_success_is_case_sensitive() {
        assert!(expect_success("success".into()).is_err());
    }
}
