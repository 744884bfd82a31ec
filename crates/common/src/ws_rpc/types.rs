/// WebSocket RPC 数据类型定义
///
/// 握手、服务注册与服务查询使用的消息体

use crate::models::Visibility;
use serde::{Deserialize, Serialize};

// ============================================================================
// 握手
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectRequest {
    pub workspace: String,
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub workspace: String,
    pub client_id: String,
    #[serde(default)]
    pub server_version: String,
}

// ============================================================================
// Server 信息
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub workspace: String,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub connected_clients: usize,
    #[serde(default)]
    pub server_time: String,
}

// ============================================================================
// 服务注册
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceConfig {
    #[serde(default)]
    pub visibility: Visibility,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRegistration {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub config: ServiceConfig,
    pub functions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    /// 完整服务 ID：`{workspace}/{client_id}:{service_id}`
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub config: ServiceConfig,
    #[serde(default)]
    pub functions: Vec<String>,
}

impl ServiceInfo {
    /// 是否提供指定函数
    pub fn has_function(&self, function: &str) -> bool {
        self.functions.iter().any(|f| f == function)
    }
}
