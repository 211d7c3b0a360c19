//! Domain error types.

/// Top-level error type for quantboard.
#[derive(Debug, thiserror::Error)]
pub enum QuantboardError {
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("data integrity error: {reason}")]
    DataIntegrity { reason: String },

    #[error("insufficient data: have {bars} bars, need {minimum}")]
    InsufficientData { bars: usize, minimum: usize },

    #[error("no data for {ticker} at interval {interval}")]
    NoData { ticker: String, interval: String },

    #[error("data source error: {reason}")]
    DataSource { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl QuantboardError {
    pub fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        QuantboardError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn data_integrity(reason: impl Into<String>) -> Self {
        QuantboardError::DataIntegrity {
            reason: reason.into(),
        }
    }

    /// Caller-correctable: aborts only the computation that raised it.
    pub fn is_invalid_parameter(&self) -> bool {
        matches!(self, QuantboardError::InvalidParameter { .. })
    }

    /// The shared input series is unusable.
    pub fn is_data_integrity(&self) -> bool {
        matches!(
            self,
            QuantboardError::DataIntegrity { .. }
                | QuantboardError::InsufficientData { .. }
                | QuantboardError::NoData { .. }
        )
    }
}

impl From<&QuantboardError> for std::process::ExitCode {
    fn from(err: &QuantboardError) -> Self {
        let code: u8 = match err {
            QuantboardError::Io(_) => 1,
            QuantboardError::ConfigParse { .. } | QuantboardError::ConfigInvalid { .. } => 2,
            QuantboardError::DataSource { .. } | QuantboardError::Report { .. } => 3,
            QuantboardError::InvalidParameter { .. } => 4,
            QuantboardError::DataIntegrity { .. }
            | QuantboardError::InsufficientData { .. }
            | QuantboardError::NoData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        let err = QuantboardError::invalid_parameter("fast", "must be less than slow");
        assert!(err.is_invalid_parameter());
        assert!(!err.is_data_integrity());

        let err = QuantboardError::InsufficientData {
            bars: 10,
            minimum: 50,
        };
        assert!(err.is_data_integrity());
        assert!(!err.is_invalid_parameter());
    }

    #[test]
    fn display_messages() {
        let err = QuantboardError::invalid_parameter("window", "must be at least 1");
        assert_eq!(err.to_string(), "invalid parameter window: must be at least 1");

        let err = QuantboardError::data_integrity("timestamps not strictly increasing at row 3");
        assert_eq!(
            err.to_string(),
            "data integrity error: timestamps not strictly increasing at row 3"
        );

        let err = QuantboardError::ConfigInvalid {
            section: "backtest".into(),
            key: "interval".into(),
            reason: "unknown interval".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid config value [backtest] interval: unknown interval"
        );
    }
}
