//! # 错误模型模块
//!
//! ## 设计思路
//!
//! 使用单一错误枚举承载九宫格链路中的所有错误来源，避免字符串拼接式错误处理。
//! 通过 `thiserror` 保持人类可读错误，同时让调用侧可按分支匹配。
//!
//! 加载阶段的错误原样上抛；合成器再用 `Composition` 包一层，
//! 标明是哪一格（用户图片 / 第 N 张填充图 / 画布）出的问题。

use std::fmt;

/// 出错的图片槽位。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSlot {
    /// 用户上传的图片。
    User,
    /// 第 `index` 张填充图片（按填充顺序，从 0 开始）。
    Filler { index: usize, name: String },
    /// 画布绘制或编码阶段。
    Canvas,
}

impl fmt::Display for ImageSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "用户图片"),
            Self::Filler { index, name } => write!(f, "填充图片 #{}（{}）", index, name),
            Self::Canvas => write!(f, "画布"),
        }
    }
}

/// 九宫格处理统一错误类型。
///
/// 该类型会在应用层被上转为 `AppError`。
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    #[error("文件错误：{0}")]
    FileSystem(String),

    #[error("网络错误：{0}")]
    Network(String),

    #[error("超时错误：{0}")]
    Timeout(String),

    #[error("解码错误：{0}")]
    Decode(String),

    #[error("格式错误：{0}")]
    InvalidFormat(String),

    #[error("配置错误：{0}")]
    InvalidConfig(String),

    #[error("资源限制：{0}")]
    ResourceLimit(String),

    #[error("编码错误：{0}")]
    Encode(String),

    #[error("已取消：{0}")]
    Cancelled(String),

    /// 内部状态不可用（如锁中毒）。
    #[error("内部错误：{0}")]
    Internal(String),

    #[error("合成失败（{slot}）：{source}")]
    Composition {
        slot: ImageSlot,
        #[source]
        source: Box<GridError>,
    },
}

impl GridError {
    /// 将任意阶段错误包装为指定槽位的合成错误。
    ///
    /// 配置错误与取消不属于“某一格失败”，保持原样。
    pub(crate) fn in_slot(self, slot: ImageSlot) -> Self {
        match self {
            Self::InvalidConfig(_)
            | Self::Cancelled(_)
            | Self::Internal(_)
            | Self::Composition { .. } => self,
            other => Self::Composition {
                slot,
                source: Box::new(other),
            },
        }
    }

    /// 稳定错误码，供外部调用方（HTTP / IPC）做分支展示。
    pub fn code(&self) -> &'static str {
        match self {
            Self::FileSystem(_) => "E_IO",
            Self::Network(_) => "E_NETWORK",
            Self::Timeout(_) => "E_TIMEOUT",
            Self::Decode(_) => "E_DECODE",
            Self::InvalidFormat(_) => "E_FORMAT",
            Self::InvalidConfig(_) => "E_CONFIG",
            Self::ResourceLimit(_) => "E_LIMIT",
            Self::Encode(_) => "E_ENCODE",
            Self::Cancelled(_) => "E_CANCELLED",
            Self::Internal(_) => "E_INTERNAL",
            Self::Composition { .. } => "E_COMPOSITION",
        }
    }

    /// 错误发生的处理阶段。
    pub fn stage(&self) -> &'static str {
        match self {
            Self::FileSystem(_) | Self::Network(_) | Self::Timeout(_) => "load",
            Self::Decode(_) | Self::InvalidFormat(_) | Self::ResourceLimit(_) => "decode",
            Self::InvalidConfig(_) => "validate",
            Self::Encode(_) => "encode",
            Self::Cancelled(_) => "cancel",
            Self::Internal(_) => "internal",
            Self::Composition { source, .. } => match source.as_ref() {
                Self::Encode(_) => "encode",
                _ => "compose",
            },
        }
    }

    /// 是否属于 IO 类错误（来源不可读）。
    pub fn is_io(&self) -> bool {
        matches!(self, Self::FileSystem(_) | Self::Network(_) | Self::Timeout(_))
    }

    /// 合成错误对应的槽位。
    pub fn slot(&self) -> Option<&ImageSlot> {
        match self {
            Self::Composition { slot, .. } => Some(slot),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_slot_wraps_decode_errors() {
        let err = GridError::Decode("bad".into()).in_slot(ImageSlot::Filler {
            index: 3,
            name: "猫.jpg".into(),
        });

        assert_eq!(err.code(), "E_COMPOSITION");
        assert_eq!(err.stage(), "compose");
        assert!(matches!(
            err.slot(),
            Some(ImageSlot::Filler { index: 3, .. })
        ));
        assert!(err.to_string().contains("猫.jpg"));
    }

    #[test]
    fn in_slot_keeps_config_and_cancel_errors() {
        let config = GridError::InvalidConfig("x".into()).in_slot(ImageSlot::User);
        assert!(matches!(config, GridError::InvalidConfig(_)));

        let cancelled = GridError::Cancelled("x".into()).in_slot(ImageSlot::Canvas);
        assert!(matches!(cancelled, GridError::Cancelled(_)));
    }

    #[test]
    fn internal_errors_are_not_tagged_with_a_slot() {
        let err = GridError::Internal("锁已中毒".into()).in_slot(ImageSlot::User);
        assert!(matches!(err, GridError::Internal(_)));
        assert_eq!(err.code(), "E_INTERNAL");
        assert_eq!(err.stage(), "internal");
        assert!(!err.is_io());
    }

    #[test]
    fn encode_failures_report_encode_stage() {
        let err = GridError::Encode("jpeg".into()).in_slot(ImageSlot::Canvas);
        assert_eq!(err.stage(), "encode");
    }

    #[test]
    fn io_classification() {
        assert!(GridError::FileSystem("x".into()).is_io());
        assert!(GridError::Timeout("x".into()).is_io());
        assert!(!GridError::Decode("x".into()).is_io());
    }
}
