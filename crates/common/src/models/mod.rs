/// 共享数据模型
///
/// 定义 Client、Probe 和 Testkit 共享的数据结构

use serde::{Deserialize, Serialize};
use std::fmt;

/// 服务可见性
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// 所有工作空间可见
    #[default]
    Public,
    /// 仅同一工作空间可见
    Protected,
    /// 可以按 ID 获取，但不出现在服务列表中
    Unlisted,
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Public => "public",
            Self::Protected => "protected",
            Self::Unlisted => "unlisted",
        };
        write!(f, "{}", s)
    }
}

/// 客户端连接状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Disconnected,
    Connecting,
    Connected,
}

/// 常量定义
pub mod constants {
    /// 默认 Server 地址
    pub const DEFAULT_SERVER_URL: &str = "http://localhost:9527";

    /// 默认工作空间
    pub const DEFAULT_WORKSPACE: &str = "default";

    /// WebSocket 端点路径
    pub const WS_PATH: &str = "/ws";

    /// 握手超时（秒）
    pub const HANDSHAKE_TIMEOUT_SECS: u64 = 10;

    /// 默认 RPC 调用超时（秒）
    pub const DEFAULT_METHOD_TIMEOUT_SECS: u64 = 30;

    /// 内置服务 ID 后缀，非特权客户端注册服务时需要携带
    pub const BUILT_IN_SUFFIX: &str = ":built-in";

    /// Server 自身注册服务时使用的客户端 ID
    pub const SERVER_CLIENT_ID: &str = "root";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visibility_serde() {
        let v: Visibility = serde_json::from_str("\"protected\"").unwrap();
        assert_eq!(v, Visibility::Protected);
        assert_eq!(serde_json::to_string(&Visibility::Unlisted).unwrap(), "\"unlisted\"");
        assert_eq!(Visibility::default(), Visibility::Public);
    }
}
