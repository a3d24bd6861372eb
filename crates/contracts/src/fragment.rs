//! Fragment - FragmentDecoder 输出
//!
//! 单个前端节点对一个逻辑事件贡献的数据。

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::NodeId;

/// 物理事件数据缓冲类型码
pub const TYPE_PHYSICS: u16 = 1;
/// 定时计数器缓冲
pub const TYPE_SCALER: u16 = 2;
/// 快照计数器缓冲
pub const TYPE_SNAPSHOT_SCALER: u16 = 3;
/// 状态变量文档
pub const TYPE_STATE_VARIABLES: u16 = 4;
/// 运行变量文档
pub const TYPE_RUN_VARIABLES: u16 = 5;
/// 数据包文档
pub const TYPE_PACKET_DOCUMENTATION: u16 = 6;
/// 运行开始
pub const TYPE_BEGIN_RUN: u16 = 11;
/// 运行结束
pub const TYPE_END_RUN: u16 = 12;
/// 暂停
pub const TYPE_PAUSE_RUN: u16 = 13;
/// 恢复
pub const TYPE_RESUME_RUN: u16 = 14;
/// 参数描述
pub const TYPE_PARAMETER_DESCRIPTION: u16 = 30;

/// 数据片段
///
/// 由解码器创建，在被消费前归属于一个节点队列或一个 Assembly。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    /// 来源节点
    pub node: NodeId,

    /// 片段内容
    pub body: FragmentBody,
}

/// 片段内容 (按类型区分)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FragmentBody {
    /// 物理事件
    Physics(PhysicsFragment),

    /// 运行状态转换
    StateTransition(TransitionFragment),

    /// 计数器
    Scaler(ScalerFragment),

    /// 字符串列表 (文档类)
    StringList(StringListFragment),
}

/// 物理事件片段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicsFragment {
    /// 32 位自由运行时间戳 (会回绕)
    pub timestamp: u32,

    /// 事件数据 (已按小端字序规整)
    pub payload: Bytes,
}

/// 运行状态转换类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    Begin,
    End,
    Pause,
    Resume,
}

/// 状态转换片段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionFragment {
    /// 转换类型
    pub transition: TransitionKind,

    /// 运行号
    pub run_number: u32,

    /// 运行标题
    pub title: String,

    /// 运行已持续时间 (秒)
    pub elapsed_time: u32,

    /// 绝对时间 (Unix 秒)
    pub absolute_time: u32,
}

/// 计数器类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalerKind {
    /// 周期读出 (读后清零)
    Scaler,
    /// 快照 (不清零)
    Snapshot,
}

/// 计数器片段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerFragment {
    pub kind: ScalerKind,

    /// 区间起点 (秒)
    pub interval_start: u32,

    /// 区间终点 (秒)
    pub interval_end: u32,

    /// 计数值
    pub values: Vec<u32>,
}

/// 字符串列表类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StringListKind {
    StateVariables,
    RunVariables,
    PacketDocumentation,
    ParameterDescription,
}

/// 字符串列表片段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StringListFragment {
    pub kind: StringListKind,
    pub strings: Vec<String>,
}

impl TransitionKind {
    /// 缓冲类型码
    pub fn type_code(self) -> u16 {
        match self {
            TransitionKind::Begin => TYPE_BEGIN_RUN,
            TransitionKind::End => TYPE_END_RUN,
            TransitionKind::Pause => TYPE_PAUSE_RUN,
            TransitionKind::Resume => TYPE_RESUME_RUN,
        }
    }

    pub fn from_type_code(code: u16) -> Option<Self> {
        match code {
            TYPE_BEGIN_RUN => Some(TransitionKind::Begin),
            TYPE_END_RUN => Some(TransitionKind::End),
            TYPE_PAUSE_RUN => Some(TransitionKind::Pause),
            TYPE_RESUME_RUN => Some(TransitionKind::Resume),
            _ => None,
        }
    }

    /// End / Pause 完成时作为屏障，清除之前的未完成事件
    pub fn is_barrier(self) -> bool {
        matches!(self, TransitionKind::End | TransitionKind::Pause)
    }
}

impl ScalerKind {
    pub fn type_code(self) -> u16 {
        match self {
            ScalerKind::Scaler => TYPE_SCALER,
            ScalerKind::Snapshot => TYPE_SNAPSHOT_SCALER,
        }
    }

    pub fn from_type_code(code: u16) -> Option<Self> {
        match code {
            TYPE_SCALER => Some(ScalerKind::Scaler),
            TYPE_SNAPSHOT_SCALER => Some(ScalerKind::Snapshot),
            _ => None,
        }
    }
}

impl StringListKind {
    pub fn type_code(self) -> u16 {
        match self {
            StringListKind::StateVariables => TYPE_STATE_VARIABLES,
            StringListKind::RunVariables => TYPE_RUN_VARIABLES,
            StringListKind::PacketDocumentation => TYPE_PACKET_DOCUMENTATION,
            StringListKind::ParameterDescription => TYPE_PARAMETER_DESCRIPTION,
        }
    }

    pub fn from_type_code(code: u16) -> Option<Self> {
        match code {
            TYPE_STATE_VARIABLES => Some(StringListKind::StateVariables),
            TYPE_RUN_VARIABLES => Some(StringListKind::RunVariables),
            TYPE_PACKET_DOCUMENTATION => Some(StringListKind::PacketDocumentation),
            TYPE_PARAMETER_DESCRIPTION => Some(StringListKind::ParameterDescription),
            _ => None,
        }
    }
}

/// 片段类别 (用于错误信息与日志)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentKind {
    Physics,
    StateTransition(TransitionKind),
    Scaler,
    StringList,
}

impl fmt::Display for FragmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FragmentKind::Physics => write!(f, "physics"),
            FragmentKind::StateTransition(kind) => write!(f, "transition({kind:?})"),
            FragmentKind::Scaler => write!(f, "scaler"),
            FragmentKind::StringList => write!(f, "string_list"),
        }
    }
}

impl Fragment {
    /// 构造物理事件片段
    pub fn physics(node: impl Into<NodeId>, timestamp: u32, payload: impl Into<Bytes>) -> Self {
        Self {
            node: node.into(),
            body: FragmentBody::Physics(PhysicsFragment {
                timestamp,
                payload: payload.into(),
            }),
        }
    }

    /// 构造状态转换片段
    pub fn transition(
        node: impl Into<NodeId>,
        transition: TransitionKind,
        run_number: u32,
        title: impl Into<String>,
    ) -> Self {
        Self {
            node: node.into(),
            body: FragmentBody::StateTransition(TransitionFragment {
                transition,
                run_number,
                title: title.into(),
                elapsed_time: 0,
                absolute_time: 0,
            }),
        }
    }

    pub fn kind(&self) -> FragmentKind {
        match &self.body {
            FragmentBody::Physics(_) => FragmentKind::Physics,
            FragmentBody::StateTransition(t) => FragmentKind::StateTransition(t.transition),
            FragmentBody::Scaler(_) => FragmentKind::Scaler,
            FragmentBody::StringList(_) => FragmentKind::StringList,
        }
    }

    /// 缓冲类型码
    pub fn type_code(&self) -> u16 {
        match &self.body {
            FragmentBody::Physics(_) => TYPE_PHYSICS,
            FragmentBody::StateTransition(t) => t.transition.type_code(),
            FragmentBody::Scaler(s) => s.kind.type_code(),
            FragmentBody::StringList(s) => s.kind.type_code(),
        }
    }

    /// 物理片段的原始时间戳
    pub fn timestamp(&self) -> Option<u32> {
        match &self.body {
            FragmentBody::Physics(p) => Some(p.timestamp),
            _ => None,
        }
    }

    /// 载荷字节数 (诊断用)
    pub fn payload_len(&self) -> usize {
        match &self.body {
            FragmentBody::Physics(p) => p.payload.len(),
            FragmentBody::StateTransition(t) => t.title.len() + 8,
            FragmentBody::Scaler(s) => 8 + s.values.len() * 4,
            FragmentBody::StringList(s) => s.strings.iter().map(|s| s.len() + 1).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_codes_round_trip_through_kinds() {
        for kind in [
            TransitionKind::Begin,
            TransitionKind::End,
            TransitionKind::Pause,
            TransitionKind::Resume,
        ] {
            assert_eq!(TransitionKind::from_type_code(kind.type_code()), Some(kind));
        }
        assert_eq!(TransitionKind::from_type_code(TYPE_PHYSICS), None);
        assert_eq!(
            StringListKind::from_type_code(TYPE_PARAMETER_DESCRIPTION),
            Some(StringListKind::ParameterDescription)
        );
        assert_eq!(ScalerKind::from_type_code(3), Some(ScalerKind::Snapshot));
    }

    #[test]
    fn test_barrier_transitions() {
        assert!(TransitionKind::End.is_barrier());
        assert!(TransitionKind::Pause.is_barrier());
        assert!(!TransitionKind::Begin.is_barrier());
        assert!(!TransitionKind::Resume.is_barrier());
    }

    #[test]
    fn test_fragment_accessors() {
        let frag = Fragment::physics(NodeId::new(0x5555), 0x12345678, vec![1u8, 2, 3, 4]);
        assert_eq!(frag.kind(), FragmentKind::Physics);
        assert_eq!(frag.type_code(), TYPE_PHYSICS);
        assert_eq!(frag.timestamp(), Some(0x12345678));
        assert_eq!(frag.payload_len(), 4);

        let end = Fragment::transition(NodeId::new(0x5555), TransitionKind::End, 42, "calibration");
        assert_eq!(end.type_code(), TYPE_END_RUN);
        assert_eq!(end.timestamp(), None);
    }
}
