use thiserror::Error;

/// Errors returned by exchange gateways
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// Network, timeout or body-decoding failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Error reported by the exchange itself
    #[error("Exchange API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("Insufficient balance: {0}")]
    InsufficientBalance(String),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Non-success status with a body we could not interpret
    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// Response payload did not have the expected shape
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl ExchangeError {
    /// Parse a Binance error body of the form `{"code": -1000, "msg": "..."}`
    pub fn from_response(status: u16, body: &str) -> Self {
        #[derive(serde::Deserialize)]
        struct ApiErrorBody {
            code: i64,
            msg: String,
        }

        match serde_json::from_str::<ApiErrorBody>(body) {
            Ok(err) => Self::classify(err.code, err.msg),
            Err(_) => Self::Status {
                status,
                body: body.to_string(),
            },
        }
    }

    fn classify(code: i64, message: String) -> Self {
        match code {
            -2010 if message.to_lowercase().contains("insufficient balance") => {
                Self::InsufficientBalance(message)
            }
            -2011 | -2013 => Self::OrderNotFound(message),
            _ => Self::Api { code, message },
        }
    }
}
