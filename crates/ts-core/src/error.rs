use derive_more::From;
use orion_error::{ErrorCode, StructError, UvsReason};

#[derive(Debug, Clone, PartialEq, thiserror::Error, From)]
pub enum CoreReason {
    #[error("stream open error")]
    Open,
    #[error("segment index error")]
    Index,
    #[error("stream io error")]
    Io,
    #[error("invalid seek")]
    Seek,
    #[error("{0}")]
    Uvs(UvsReason),
}

impl ErrorCode for CoreReason {
    fn error_code(&self) -> i32 {
        match self {
            Self::Open => 1101,
            Self::Index => 1102,
            Self::Io => 1103,
            Self::Seek => 1104,
            Self::Uvs(u) => u.error_code(),
        }
    }
}

pub type CoreError = StructError<CoreReason>;
pub type CoreResult<T> = Result<T, CoreError>;
