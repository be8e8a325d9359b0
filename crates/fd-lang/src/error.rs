/// Errors raised while compiling DSL text.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },
    #[error("invalid {kind} literal '{literal}'")]
    BadTemporal { kind: &'static str, literal: String },
    #[error("invalid regex '{pattern}': {reason}")]
    BadRegex { pattern: String, reason: String },
    #[error("'?' is only valid inside a matches or have body")]
    StrayPlaceholder,
}
