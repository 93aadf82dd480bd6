use thiserror::Error;

/// Errors raised while building a [`Connection`](crate::Connection).
///
/// All of these are reported synchronously by the constructor. Failures that
/// happen while talking to the gateway belong to the transport's own error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("URI needs to be a HTTPS address")]
    InsecureUri,
    #[error("Invalid URI: {0}")]
    InvalidUri(#[from] http::uri::InvalidUri),
    #[error("URI has no host: {0}")]
    MissingHost(String),
    #[error("Cert file not found: {0}")]
    CertNotFound(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(Error::InsecureUri.to_string(), "URI needs to be a HTTPS address");
        assert_eq!(
            Error::CertNotFound("/non-existant.crt".to_string()).to_string(),
            "Cert file not found: /non-existant.crt"
        );
    }
}
