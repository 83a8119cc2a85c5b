//! Runtime settings for the graph runner.

use crate::GraphError;

/// Node budget per turn when `GRAPH_MAX_STEPS` is not set.
pub const DEFAULT_MAX_STEPS: usize = 25;

/// Graph runner settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphConfig {
    /// Maximum number of nodes executed in one turn before the runner gives
    /// up with an apology.
    pub max_steps: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

impl GraphConfig {
    /// Reads `GRAPH_MAX_STEPS` from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Config`] if the value is not a positive integer.
    pub fn from_env() -> Result<Self, GraphError> {
        match std::env::var("GRAPH_MAX_STEPS") {
            Ok(value) => Self::parse_max_steps(&value).map(|max_steps| Self { max_steps }),
            Err(_) => Ok(Self::default()),
        }
    }

    fn parse_max_steps(value: &str) -> Result<usize, GraphError> {
        match value.trim().parse::<usize>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(GraphError::Config {
                message: format!("GRAPH_MAX_STEPS must be a positive integer, got '{value}'"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_positive_budgets_only() {
        assert_eq!(GraphConfig::parse_max_steps(" 10 ").unwrap(), 10);
        assert!(GraphConfig::parse_max_steps("0").is_err());
        assert!(GraphConfig::parse_max_steps("many").is_err());
    }
}
