use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum AutomatonError {
    #[error("failed to parse regex '{pattern}': {message}")]
    RegexParse { pattern: String, message: String },

    #[error("regex feature not supported by the automaton compiler: {feature}")]
    UnsupportedRegex { feature: &'static str },

    #[error("automaton does not denote a single string")]
    NotSingleton,
}
