use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] morningshow_core::ConfigError),

    #[error("invalid date '{value}', expected YYYY-MM-DD")]
    InvalidDate { value: String },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::InvalidDate { .. } => 2,
            Self::Serialization(_) => 10,
            Self::Io(_) => 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use morningshow_core::ConfigError;

    #[test]
    fn configuration_problems_exit_with_two() {
        let config = CliError::from(ConfigError::UnknownTimezone {
            value: String::from("Mars/Olympus"),
        });
        let date = CliError::InvalidDate {
            value: String::from("03.06.2024"),
        };

        assert_eq!(config.exit_code(), 2);
        assert_eq!(date.exit_code(), 2);
    }

    #[test]
    fn io_failures_exit_with_ten() {
        let error = CliError::from(std::io::Error::other("stdout closed"));

        assert_eq!(error.exit_code(), 10);
    }
}
