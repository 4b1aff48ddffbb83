//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 定义应用级统一的 `AppError` 枚举，CLI 与上层调用方（HTTP / 桌面壳）
//! 统一拿到 `Result<T, AppError>`，并可通过 `Serialize` 获得结构化的错误信息。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - 为 `GridError` 与 `std::io::Error` 提供 `From` 转换，无需手动 map。
//! - 实现 `Serialize` 将错误序列化为字符串，满足 IPC / JSON 响应要求。

use serde::Serialize;

use crate::nine_grid::GridError;

/// 应用级统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 九宫格流水线错误（加载 / 解码 / 合成 / 编码）
    #[error("{0}")]
    Grid(#[from] GridError),

    /// 文件系统 I/O 错误
    #[error("文件系统错误: {0}")]
    Io(#[from] std::io::Error),

    /// 设置文件读取或解析失败
    #[error("设置错误: {0}")]
    Settings(String),
}

impl AppError {
    /// 稳定错误码；非流水线错误使用应用级错误码。
    pub fn code(&self) -> &'static str {
        match self {
            Self::Grid(err) => err.code(),
            Self::Io(_) => "E_IO",
            Self::Settings(_) => "E_SETTINGS",
        }
    }
}

/// 将错误序列化为人类可读的字符串。
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_errors_keep_their_message_and_code() {
        let err: AppError = GridError::InvalidConfig("位置越界".into()).into();
        assert_eq!(err.to_string(), "配置错误：位置越界");
        assert_eq!(err.code(), "E_CONFIG");
    }

    #[test]
    fn serializes_as_display_string() {
        let err = AppError::Settings("缺少字段".into());
        let json = serde_json::to_string(&err).expect("serialize");
        assert_eq!(json, "\"设置错误: 缺少字段\"");
    }
}
