/// Probe 注册到 Server 的本地服务

use client::{LocalService, RpcError, Visibility};
use common::ws_rpc::param;
use serde::Serialize;
use serde_json::{json, Number, Value};

/// 服务 ID，携带 :built-in 后缀以满足 Server 的注册规则
pub const SERVICE_ID: &str = "rust-client-service:built-in";

/// 客户端环境信息
#[derive(Debug, Clone, Serialize)]
pub struct ClientInfo {
    pub client: String,
    pub version: String,
    pub platform: String,
    pub arch: String,
    pub hostname: String,
}

impl ClientInfo {
    pub fn collect() -> Self {
        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        Self {
            client: "rust-probe".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            platform: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            hostname,
        }
    }
}

pub fn build() -> LocalService {
    LocalService::new(SERVICE_ID)
        .name("Rust Client Service")
        .description("Service registered by the Rust probe client")
        .visibility(Visibility::Public)
        .function("compute_square", compute_square)
        .function("get_client_info", get_client_info)
}

fn compute_square(payload: Value) -> Result<Value, RpcError> {
    let n: Number = param(&payload, 0)?;

    if let Some(i) = n.as_i64() {
        return i
            .checked_mul(i)
            .map(Value::from)
            .ok_or_else(|| overflow(&n));
    }
    if let Some(u) = n.as_u64() {
        return u
            .checked_mul(u)
            .map(Value::from)
            .ok_or_else(|| overflow(&n));
    }

    let f = n
        .as_f64()
        .ok_or_else(|| RpcError::invalid_params("参数不是有效数字"))?;
    Number::from_f64(f * f)
        .map(Value::Number)
        .ok_or_else(|| RpcError::invalid_params(format!("{} 的平方不是有限数", f)))
}

fn overflow(n: &Number) -> RpcError {
    RpcError::invalid_params(format!("{} 的平方溢出", n))
}

fn get_client_info(_payload: Value) -> Result<Value, RpcError> {
    Ok(json!(ClientInfo::collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_square() {
        assert_eq!(compute_square(json!([7])).unwrap(), json!(49));
        assert_eq!(compute_square(json!([-3])).unwrap(), json!(9));
        assert_eq!(compute_square(json!([1.5])).unwrap(), json!(2.25));
    }

    #[test]
    fn test_compute_square_rejects_bad_input() {
        assert!(compute_square(json!(["seven"])).is_err());
        assert!(compute_square(json!([])).is_err());
        assert!(compute_square(json!([i64::MAX])).is_err());

        // 整数溢出一律报错，不退化为浮点
        for n in [json!(u64::MAX), json!(3037000500i64), json!(-3037000500i64)] {
            let err = compute_square(json!([n])).unwrap_err();
            assert_eq!(err.code, client::RpcErrorCode::InvalidParams);
        }
        assert_eq!(compute_square(json!([3037000499i64])).unwrap(), json!(9223372030926249001i64));
    }

    #[test]
    fn test_client_info() {
        let info = get_client_info(json!([])).unwrap();
        assert_eq!(info["client"], "rust-probe");
        assert_eq!(info["platform"], std::env::consts::OS);
        assert!(info["hostname"].as_str().is_some());
    }

    #[test]
    fn test_registration() {
        let reg = build().registration();
        assert_eq!(reg.id, SERVICE_ID);
        assert_eq!(reg.name, "Rust Client Service");
        assert!(reg.functions.contains(&"compute_square".to_string()));
        assert!(reg.functions.contains(&"get_client_info".to_string()));
    }
}
