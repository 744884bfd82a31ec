/// 服务注册表

use common::models::constants::{BUILT_IN_SUFFIX, DEFAULT_WORKSPACE, SERVER_CLIENT_ID};
use common::models::Visibility;
use common::utils::{is_built_in, qualified_service_id};
use common::ws_rpc::{RpcError, RpcErrorCode, ServiceInfo, ServiceRegistration};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::manager::client_key;

/// 已注册的服务
#[derive(Debug, Clone)]
pub struct RegisteredService {
    pub info: ServiceInfo,
    /// 所属工作空间
    pub workspace: String,
    /// 注册时使用的服务 ID
    pub local_id: String,
    /// 所属客户端键，Server 自身的服务为 None
    pub owner: Option<String>,
}

impl RegisteredService {
    fn visible_from(&self, workspace: &str) -> bool {
        self.workspace == workspace || self.info.config.visibility != Visibility::Protected
    }
}

#[derive(Clone, Default)]
pub struct ServiceRegistry {
    /// 完整服务 ID -> 服务
    services: Arc<RwLock<HashMap<String, RegisteredService>>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册客户端服务
    pub async fn register(
        &self,
        workspace: &str,
        client_id: &str,
        registration: ServiceRegistration,
        require_built_in: bool,
    ) -> Result<ServiceInfo, RpcError> {
        if registration.id.is_empty() || registration.id.contains('.') {
            return Err(RpcError::invalid_params(format!("无效的服务 ID: {:?}", registration.id)));
        }
        if registration.functions.iter().any(|f| f.is_empty() || f.contains('.')) {
            return Err(RpcError::invalid_params("函数名不能为空且不能包含 '.'"));
        }
        if require_built_in && !is_built_in(&registration.id) {
            return Err(RpcError::with_details(
                RpcErrorCode::PermissionDenied,
                format!("非特权客户端只能注册内置服务: {}", registration.id),
                json!({ "service_id": registration.id, "required_suffix": BUILT_IN_SUFFIX }),
            ));
        }

        let info = self
            .insert(workspace, client_id, registration, Some(client_key(workspace, client_id)))
            .await?;
        info!("📝 服务已注册: id={}", info.id);
        Ok(info)
    }

    /// 注册 Server 自身提供的服务
    pub async fn register_server_service(
        &self,
        registration: ServiceRegistration,
    ) -> Result<ServiceInfo, RpcError> {
        self.insert(DEFAULT_WORKSPACE, SERVER_CLIENT_ID, registration, None).await
    }

    async fn insert(
        &self,
        workspace: &str,
        client_id: &str,
        registration: ServiceRegistration,
        owner: Option<String>,
    ) -> Result<ServiceInfo, RpcError> {
        let id = qualified_service_id(workspace, client_id, &registration.id);
        let mut services = self.services.write().await;
        if services.contains_key(&id) {
            return Err(RpcError::service_already_exists(id));
        }

        let info = ServiceInfo {
            id: id.clone(),
            name: registration.name,
            description: registration.description,
            config: registration.config,
            functions: registration.functions,
        };
        services.insert(id, RegisteredService {
            info: info.clone(),
            workspace: workspace.to_string(),
            local_id: registration.id,
            owner,
        });
        Ok(info)
    }

    /// 注销客户端自己的服务，接受注册时的 ID 或完整 ID
    pub async fn unregister(
        &self,
        workspace: &str,
        client_id: &str,
        service_id: &str,
    ) -> Result<(), RpcError> {
        let owner = client_key(workspace, client_id);
        let qualified = if service_id.contains('/') {
            service_id.to_string()
        } else {
            qualified_service_id(workspace, client_id, service_id)
        };

        let mut services = self.services.write().await;
        match services.get(&qualified) {
            Some(service) if service.owner.as_deref() == Some(owner.as_str()) => {
                services.remove(&qualified);
                info!("服务已注销: id={}", qualified);
                Ok(())
            }
            Some(_) => Err(RpcError::permission_denied(format!("无权注销服务: {}", qualified))),
            None => Err(RpcError::service_not_found(qualified)),
        }
    }

    /// 解析服务 ID
    ///
    /// 完整 ID 精确匹配；短 ID 先在调用方工作空间内查找，再查找 Server 自身的服务
    pub async fn resolve(&self, workspace: &str, service_id: &str) -> Result<RegisteredService, RpcError> {
        let services = self.services.read().await;

        let found = if let Some(service) = services.get(service_id) {
            Some(service)
        } else {
            let mut candidates: Vec<&RegisteredService> = services
                .values()
                .filter(|s| s.local_id == service_id)
                .filter(|s| s.workspace == workspace || s.owner.is_none())
                .collect();
            // 调用方工作空间优先，其次按 ID 排序保证结果稳定
            candidates.sort_by(|a, b| {
                (a.workspace != workspace, &a.info.id).cmp(&(b.workspace != workspace, &b.info.id))
            });
            candidates.into_iter().next()
        };

        match found {
            Some(service) if service.visible_from(workspace) => {
                debug!("解析服务: {} -> {}", service_id, service.info.id);
                Ok(service.clone())
            }
            Some(service) => Err(RpcError::permission_denied(format!(
                "服务仅对其工作空间可见: {}",
                service.info.id
            ))),
            None => Err(RpcError::service_not_found(service_id)),
        }
    }

    /// 列出对调用方可见的服务
    pub async fn list(&self, workspace: &str) -> Vec<ServiceInfo> {
        let services = self.services.read().await;
        let mut infos: Vec<ServiceInfo> = services
            .values()
            .filter(|s| s.info.config.visibility != Visibility::Unlisted)
            .filter(|s| s.visible_from(workspace))
            .map(|s| s.info.clone())
            .collect();
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        infos
    }

    /// 移除某个客户端的全部服务
    pub async fn remove_owner(&self, owner: &str) -> usize {
        let mut services = self.services.write().await;
        let before = services.len();
        services.retain(|_, s| s.owner.as_deref() != Some(owner));
        let removed = before - services.len();
        if removed > 0 {
            info!("清理客户端服务: owner={}, count={}", owner, removed);
        }
        removed
    }
}
