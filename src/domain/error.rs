//! Domain error types.
//!
//! Configuration problems are caught before a run starts; data problems abort
//! only the run that owns the offending bars. Numeric degeneracies and short
//! history are never errors.

/// Top-level error type for simtrader.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("bad bar at index {index}: {reason}")]
    Data { index: usize, reason: String },

    #[error("no bars in {source_name}")]
    NoData { source_name: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SimError {
    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        SimError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn missing(section: &str, key: &str) -> Self {
        SimError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }
    }

    pub(crate) fn data(index: usize, reason: impl Into<String>) -> Self {
        SimError::Data {
            index,
            reason: reason.into(),
        }
    }

    /// Invalid or contradictory parameters; the run never executed.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SimError::ConfigParse { .. }
                | SimError::ConfigMissing { .. }
                | SimError::ConfigInvalid { .. }
        )
    }

    /// Malformed input bars; only the owning run is aborted.
    pub fn is_data(&self) -> bool {
        matches!(self, SimError::Data { .. } | SimError::NoData { .. })
    }
}

impl From<&SimError> for std::process::ExitCode {
    fn from(err: &SimError) -> Self {
        let code: u8 = match err {
            SimError::Io(_) => 1,
            SimError::ConfigParse { .. }
            | SimError::ConfigMissing { .. }
            | SimError::ConfigInvalid { .. } => 2,
            SimError::Data { .. } | SimError::NoData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_classify_as_configuration() {
        let err = SimError::invalid("strategy", "stop_loss_pct", "must be positive");
        assert!(err.is_configuration());
        assert!(!err.is_data());
        assert_eq!(
            err.to_string(),
            "invalid config value [strategy] stop_loss_pct: must be positive"
        );
    }

    #[test]
    fn missing_key_message() {
        let err = SimError::missing("golden_cross", "fast");
        assert_eq!(err.to_string(), "missing config key [golden_cross] fast");
    }

    #[test]
    fn data_errors_classify_as_data() {
        let err = SimError::data(7, "timestamp not increasing");
        assert!(err.is_data());
        assert!(!err.is_configuration());
        assert_eq!(err.to_string(), "bad bar at index 7: timestamp not increasing");

        let empty = SimError::NoData {
            source_name: "bars.csv".into(),
        };
        assert!(empty.is_data());
    }

    #[test]
    fn io_is_neither() {
        let err: SimError = std::io::Error::other("boom").into();
        assert!(!err.is_configuration());
        assert!(!err.is_data());
    }
}
