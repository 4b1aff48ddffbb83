//! # 进度与状态机模块
//!
//! ## 设计思路
//!
//! 单次合成的状态机：`Idle → LoadingImages → Compositing → Encoding → Done`，
//! 任一非终态都可以进入 `Failed`。`Done` / `Failed` 为终态。
//!
//! `ProgressReporter` 同时提供两种消费方式：
//! - 回调：每次推进时同步调用（仅作提示，不影响正确性）
//! - 轮询：`snapshot()` 读取当前状态
//!
//! ## 实现思路
//!
//! - 阶段只能前进，百分比单调不减；回退或终态后的更新被忽略并记录日志。
//! - 内部状态放在 `Arc<Mutex<_>>` 中，可以 `clone` 进阻塞任务。

use std::fmt;
use std::sync::{Arc, Mutex};

/// 合成阶段。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ComposeStage {
    Idle,
    LoadingImages,
    Compositing,
    Encoding,
    Done,
    Failed,
}

impl ComposeStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// 稳定字符串，供前端做本地化文案映射。
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::LoadingImages => "loading_images",
            Self::Compositing => "compositing",
            Self::Encoding => "encoding",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    fn can_transition_to(self, next: ComposeStage) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == Self::Failed || next >= self
    }
}

impl fmt::Display for ComposeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 进度快照。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeProgress {
    pub stage: ComposeStage,
    /// 0~100，单调不减。
    pub percent: u8,
    /// 失败原因（仅 `Failed`）。
    pub error: Option<String>,
}

pub type ProgressCallback = Arc<dyn Fn(&ComposeProgress) + Send + Sync>;

/// 里程碑百分比。
pub(crate) mod milestones {
    pub const LOADING_STARTED: u8 = 5;
    pub const LOADING_FINISHED: u8 = 65;
    pub const COMPOSITING: u8 = 70;
    pub const ENCODING: u8 = 90;
    pub const DONE: u8 = 100;
}

/// 进度上报器。
#[derive(Clone)]
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
    state: Arc<Mutex<ComposeProgress>>,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::silent()
    }
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("has_callback", &self.callback.is_some())
            .field("state", &self.snapshot())
            .finish()
    }
}

impl ProgressReporter {
    /// 无回调，仅支持轮询。
    pub fn silent() -> Self {
        Self {
            callback: None,
            state: Arc::new(Mutex::new(ComposeProgress {
                stage: ComposeStage::Idle,
                percent: 0,
                error: None,
            })),
        }
    }

    pub fn with_callback<F>(callback: F) -> Self
    where
        F: Fn(&ComposeProgress) + Send + Sync + 'static,
    {
        Self {
            callback: Some(Arc::new(callback)),
            ..Self::silent()
        }
    }

    /// 当前状态快照。
    pub fn snapshot(&self) -> ComposeProgress {
        match self.state.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// 推进到指定阶段与百分比。
    ///
    /// 同阶段内可只推进百分比；百分比低于当前值时保持当前值。
    pub fn advance(&self, stage: ComposeStage, percent: u8) {
        self.update(stage, percent, None);
    }

    /// 标记失败。
    pub fn fail(&self, cause: impl Into<String>) {
        self.update(ComposeStage::Failed, 0, Some(cause.into()));
    }

    fn update(&self, stage: ComposeStage, percent: u8, error: Option<String>) {
        let emitted = {
            let mut guard = match self.state.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };

            if !guard.stage.can_transition_to(stage) {
                log::debug!("忽略进度更新：{} → {}（当前 {}%）", guard.stage, stage, guard.percent);
                return;
            }

            guard.stage = stage;
            guard.percent = guard.percent.max(percent.min(milestones::DONE));
            guard.error = error;
            guard.clone()
        };

        if let Some(callback) = &self.callback {
            callback(&emitted);
        }
    }
}
