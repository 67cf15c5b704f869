//! 工具模块
//!
//! # 内容
//!
//! - [`AppError`] - 应用错误类型 (from shared::error)
//! - [`ApiResponse`] - API 响应结构 (from shared::error)
//! - 日志

pub mod logger;

pub use shared::error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};
