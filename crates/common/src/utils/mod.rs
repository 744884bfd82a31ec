/// 工具函数集合

use crate::models::constants::{BUILT_IN_SUFFIX, WS_PATH};
use crate::{Error, Result};
use url::Url;
use uuid::Uuid;

/// 生成唯一 ID
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// 生成 8 位十六进制短 ID
pub fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// 将 Server 地址转换为 WebSocket 端点
///
/// http -> ws, https -> wss；路径为空时补上 `/ws`
pub fn ws_endpoint(server_url: &str) -> Result<String> {
    let mut url = Url::parse(server_url)
        .map_err(|e| Error::InvalidArgument(format!("无效的 Server 地址 {}: {}", server_url, e)))?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(Error::InvalidArgument(format!("不支持的协议: {}", other)));
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| Error::InvalidArgument(format!("无法切换协议: {}", server_url)))?;

    if url.path().is_empty() || url.path() == "/" {
        url.set_path(WS_PATH);
    }

    Ok(url.to_string())
}

/// 是否为内置服务 ID
pub fn is_built_in(service_id: &str) -> bool {
    service_id.ends_with(BUILT_IN_SUFFIX)
}

/// 生成完整服务 ID：`{workspace}/{client_id}:{service_id}`
pub fn qualified_service_id(workspace: &str, client_id: &str, service_id: &str) -> String {
    format!("{}/{}:{}", workspace, client_id, service_id)
}

/// 拆分服务方法名 `{service_id}.{function}`
///
/// 函数名不包含 `.`，因此从右侧拆分
pub fn split_service_method(method: &str) -> Option<(&str, &str)> {
    match method.rsplit_once('.') {
        Some((service, function)) if !service.is_empty() && !function.is_empty() => {
            Some((service, function))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_id() {
        let id1 = generate_id();
        let id2 = generate_id();
        assert_ne!(id1, id2);
        assert_eq!(id1.len(), 36); // UUID v4 格式
    }

    #[test]
    fn test_short_id() {
        let id = short_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_ws_endpoint() {
        assert_eq!(ws_endpoint("http://localhost:9527").unwrap(), "ws://localhost:9527/ws");
        assert_eq!(ws_endpoint("https://example.com").unwrap(), "wss://example.com/ws");
        assert_eq!(ws_endpoint("ws://127.0.0.1:8080/rpc").unwrap(), "ws://127.0.0.1:8080/rpc");
        assert!(ws_endpoint("ftp://localhost").is_err());
        assert!(ws_endpoint("not a url").is_err());
    }

    #[test]
    fn test_is_built_in() {
        assert!(is_built_in("rust-client-service:built-in"));
        assert!(!is_built_in("rust-client-service"));
    }

    #[test]
    fn test_split_service_method() {
        assert_eq!(
            split_service_method("default/root:hello-world.hello"),
            Some(("default/root:hello-world", "hello"))
        );
        assert_eq!(split_service_method("echo"), None);
        assert_eq!(split_service_method("svc."), None);
        assert_eq!(
            qualified_service_id("default", "c1", "svc:built-in"),
            "default/c1:svc:built-in"
        );
    }
}
