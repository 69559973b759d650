//! 错误类型定义

use thiserror::Error;

/// 错误类型
#[derive(Debug, Error)]
pub enum Error {
    /// 网络错误（连接失败、响应读取失败等）
    #[error("Network error: {0}")]
    Network(String),

    /// 请求超时
    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    /// 后端返回 401，会话已被清除
    #[error("Authentication failed, please log in again")]
    Unauthorized,

    /// 后端返回的其他非成功状态
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// 本地校验失败，未发出请求
    #[error("Invalid input: {0}")]
    Validation(String),

    /// 当前用户无权执行该操作（本地检查）
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// 未认证错误
    #[error("Not authenticated")]
    NotAuthenticated,

    /// 已登录时再次登录或注册
    #[error("Already logged in, log out first")]
    AlreadyAuthenticated,

    /// 持久化存储错误
    #[error("Storage error: {0}")]
    Storage(String),

    /// 编解码错误
    #[error("Encoding/Decoding error: {0}")]
    Encoding(String),

    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// 后端返回的 HTTP 状态码（如有）
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Unauthorized => Some(401),
            Error::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Encoding(e.to_string())
    }
}

/// 结果类型
pub type Result<T> = std::result::Result<T, Error>;
