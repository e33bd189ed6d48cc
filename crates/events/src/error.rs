/// Failure talking to an external collaborator.
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote server returned a non-2xx status code.
    #[error("Collaborator returned HTTP {0}")]
    HttpStatus(u16),

    /// The remote answered `success: false`.
    #[error("Collaborator rejected the request: {0}")]
    Rejected(String),

    #[error("Unexpected response body: {0}")]
    Decode(String),

    #[error("Spreadsheet export failed: {0}")]
    Export(String),
}
