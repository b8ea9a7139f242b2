/// Errors produced by the logging core.
#[derive(thiserror::Error, Debug)]
pub enum HttpLogError {
    /// A custom filter named a field outside the catalog. Raised at setup,
    /// before any request is handled.
    #[error("invalid filter: unknown field name `{0}`")]
    InvalidFilter(String),

    /// A numeric fault code outside the known platform set.
    #[error("unknown fault code {0}")]
    UnknownFaultCode(u32),

    /// An explicit logging call named a level outside
    /// debug/info/warning/error/fatal.
    #[error("invalid log level `{0}`")]
    InvalidLevel(String),

    /// Mutation attempted on a session that has already emitted its record.
    #[error("log session already closed")]
    SessionClosed,

    /// The persistence sink failed to accept a record.
    #[error("log sink write failed")]
    Io(#[from] std::io::Error),
}
