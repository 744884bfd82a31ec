/// 连接配置

use common::models::constants::{
    DEFAULT_METHOD_TIMEOUT_SECS, DEFAULT_SERVER_URL, DEFAULT_WORKSPACE,
};
use common::utils::short_id;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ConnectConfig {
    /// Server 地址，支持 http(s):// 与 ws(s)://
    pub server_url: String,
    /// 工作空间
    pub workspace: String,
    /// 客户端 ID
    pub client_id: String,
    /// 访问令牌
    pub token: Option<String>,
    /// 单次 RPC 调用超时
    pub method_timeout: Duration,
}

impl ConnectConfig {
    /// 以默认工作空间和随机客户端 ID 创建配置
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            workspace: DEFAULT_WORKSPACE.to_string(),
            client_id: format!("client-{}", short_id()),
            token: None,
            method_timeout: Duration::from_secs(DEFAULT_METHOD_TIMEOUT_SECS),
        }
    }

    pub fn with_workspace(mut self, workspace: impl Into<String>) -> Self {
        self.workspace = workspace.into();
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_method_timeout(mut self, timeout: Duration) -> Self {
        self.method_timeout = timeout;
        self
    }
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SERVER_URL)
    }
}
