use derive_more::From;
use orion_error::{ErrorCode, StructError, UvsReason};

#[derive(Debug, Clone, PartialEq, thiserror::Error, From)]
pub enum CoreReason {
    #[error("rule decode error")]
    RuleDecode,
    #[error("rule compile error")]
    RuleCompile,
    #[error("expression evaluation error")]
    Evaluation,
    #[error("aggregate state error")]
    State,
    #[error("sink error")]
    Sink,
    #[error("data format error")]
    DataFormat,
    #[error("{0}")]
    Uvs(UvsReason),
}

impl ErrorCode for CoreReason {
    fn error_code(&self) -> i32 {
        match self {
            Self::RuleDecode => 1001,
            Self::RuleCompile => 1002,
            Self::Evaluation => 1003,
            Self::State => 1004,
            Self::Sink => 1005,
            Self::DataFormat => 1006,
            Self::Uvs(u) => u.error_code(),
        }
    }
}

pub type CoreError = StructError<CoreReason>;
pub type CoreResult<T> = Result<T, CoreError>;
