/// 消息编解码辅助函数

use super::{RpcMessage, RpcError};
use tokio_tungstenite::tungstenite::Message as WsMessage;

/// 编码 RPC 消息为 WebSocket 消息
pub fn encode(msg: &RpcMessage) -> Result<WsMessage, RpcError> {
    let json = msg.to_json()?;
    Ok(WsMessage::Text(json))
}

/// 解码 WebSocket 消息为 RPC 消息
///
/// Ping/Pong 等控制帧返回 `Ok(None)`，关闭帧返回连接关闭错误
pub fn decode(ws_msg: WsMessage) -> Result<Option<RpcMessage>, RpcError> {
    match ws_msg {
        WsMessage::Text(text) => {
            RpcMessage::from_json(&text)
                .map(Some)
                .map_err(RpcError::serialization_error)
        }
        WsMessage::Binary(data) => {
            let text = String::from_utf8(data).map_err(RpcError::serialization_error)?;
            RpcMessage::from_json(&text)
                .map(Some)
                .map_err(RpcError::serialization_error)
        }
        WsMessage::Close(_) => Err(RpcError::connection_closed()),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws_rpc::RpcErrorCode;
    use serde_json::json;

    #[test]
    fn test_encode_text_frame() {
        let msg = RpcMessage::request("hello", json!(["Rust Client"]));
        match encode(&msg).unwrap() {
            WsMessage::Text(text) => assert!(text.contains("\"method\":\"hello\"")),
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[test]
    fn test_decode_binary_frame() {
        let json = RpcMessage::response("req-1", json!("pong")).to_json().unwrap();
        let decoded = decode(WsMessage::Binary(json.into_bytes())).unwrap().unwrap();
        assert_eq!(decoded.id, "req-1");
    }

    #[test]
    fn test_decode_control_frames() {
        assert!(decode(WsMessage::Ping(vec![1])).unwrap().is_none());
        let err = decode(WsMessage::Close(None)).unwrap_err();
        assert_eq!(err.code, RpcErrorCode::ConnectionClosed);
        let err = decode(WsMessage::Text("{".into())).unwrap_err();
        assert_eq!(err.code, RpcErrorCode::SerializationError);
    }
}
