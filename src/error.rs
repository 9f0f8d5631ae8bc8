use thiserror::Error;

/// Failures surfaced by the aggregation layer.
///
/// Every fetch or aggregate operation wraps the underlying failure in
/// [`MarketError::Context`] naming the metric, token or block range it was
/// working on. Use [`MarketError::root`] to classify a wrapped error.
#[derive(Error, Debug)]
pub enum MarketError {
    /// RPC call failed, timed out or returned nothing usable.
    #[error("data unavailable: {0}")]
    DataUnavailable(String),

    #[error("token approval failed: {0}")]
    ApprovalFailed(String),

    /// Write was rejected, reverted or never mined.
    #[error("transaction failed: {0}")]
    TransactionFailed(String),

    /// A derived-metric denominator was zero.
    #[error("division by zero while computing {0}")]
    DivisionByZero(&'static str),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("arithmetic overflow while computing {0}")]
    Overflow(&'static str),

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<MarketError>,
    },
}

impl MarketError {
    /// Innermost error, with every [`MarketError::Context`] layer peeled off.
    pub fn root(&self) -> &MarketError {
        let mut current = self;
        while let MarketError::Context { source, .. } = current {
            current = source;
        }
        current
    }

    pub fn is_data_unavailable(&self) -> bool {
        matches!(self.root(), MarketError::DataUnavailable(_))
    }

    pub(crate) fn unavailable(what: impl std::fmt::Display) -> Self {
        MarketError::DataUnavailable(what.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MarketError>;

/// Attaches operation context to a [`MarketError`] result.
pub trait ErrorContext<T> {
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> ErrorContext<T> for Result<T> {
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|source| MarketError::Context {
            context: f().into(),
            source: Box::new(source),
        })
    }
}
