use crate::core::file_state::FileState;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// 默认时间容差：文件系统与云端 API 的时间精度差异
pub const DEFAULT_SKEW_TOLERANCE: Duration = Duration::from_secs(1);

/// 同步动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncAction {
    /// 本地 -> 远程
    Upload,
    /// 远程 -> 本地
    Download,
    /// 不操作
    NoOp,
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncAction::Upload => write!(f, "upload"),
            SyncAction::Download => write!(f, "download"),
            SyncAction::NoOp => write!(f, "noop"),
        }
    }
}

/// 决策原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    /// 两边都不存在
    AbsentBothSides,
    /// 只有本地存在
    OnlyLocal,
    /// 只有远程存在
    OnlyRemote,
    /// 本地更新
    LocalNewer,
    /// 远程更新
    RemoteNewer,
    /// 时间差在容差内
    InSync,
    /// 两边都存在但缺少修改时间，无法判断哪边更新
    UnknownTimestamp,
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DecisionReason::AbsentBothSides => "absent on both sides",
            DecisionReason::OnlyLocal => "only exists locally",
            DecisionReason::OnlyRemote => "only exists remotely",
            DecisionReason::LocalNewer => "local is newer",
            DecisionReason::RemoteNewer => "remote is newer",
            DecisionReason::InSync => "in sync",
            DecisionReason::UnknownTimestamp => "timestamp unavailable",
        };
        f.write_str(s)
    }
}

/// 单个文件的决策结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub action: SyncAction,
    pub reason: DecisionReason,
}

impl Decision {
    fn new(action: SyncAction, reason: DecisionReason) -> Self {
        Self { action, reason }
    }
}

/// 时间戳协调器
///
/// 纯函数：结果只取决于两侧的存在性、修改时间和容差，不依赖任何历史状态。
/// 时间较新的一侧整体覆盖另一侧；两边自上次同步后都被修改时，较旧的修改会丢失。
#[derive(Debug, Clone, Copy)]
pub struct Reconciler {
    skew_tolerance: Duration,
}

impl Reconciler {
    pub fn new(skew_tolerance: Duration) -> Self {
        Self { skew_tolerance }
    }

    /// 决定单个文件的同步方向
    pub fn decide(&self, local: &FileState, remote: &FileState) -> Decision {
        match (local.exists, remote.exists) {
            (false, false) => Decision::new(SyncAction::NoOp, DecisionReason::AbsentBothSides),
            (true, false) => Decision::new(SyncAction::Upload, DecisionReason::OnlyLocal),
            (false, true) => Decision::new(SyncAction::Download, DecisionReason::OnlyRemote),
            (true, true) => {
                let (Some(local_time), Some(remote_time)) = (local.modified_at, remote.modified_at)
                else {
                    return Decision::new(SyncAction::NoOp, DecisionReason::UnknownTimestamp);
                };

                // 超出 i64 纳秒范围的容差按无限大处理
                let tolerance = chrono::Duration::from_std(self.skew_tolerance)
                    .unwrap_or(chrono::Duration::MAX);

                if local_time - remote_time > tolerance {
                    tracing::debug!(
                        "本地更新: local={}, remote={}, diff={}ms",
                        local_time,
                        remote_time,
                        (local_time - remote_time).num_milliseconds()
                    );
                    Decision::new(SyncAction::Upload, DecisionReason::LocalNewer)
                } else if remote_time - local_time > tolerance {
                    tracing::debug!(
                        "远程更新: local={}, remote={}, diff={}ms",
                        local_time,
                        remote_time,
                        (remote_time - local_time).num_milliseconds()
                    );
                    Decision::new(SyncAction::Download, DecisionReason::RemoteNewer)
                } else {
                    Decision::new(SyncAction::NoOp, DecisionReason::InSync)
                }
            }
        }
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(DEFAULT_SKEW_TOLERANCE)
    }
}
