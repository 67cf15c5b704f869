//! API 路由模块
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /api/health | GET | 健康检查 |
//! | /api/import/setup | POST | 上传导入包, 创建会话 |
//! | /api/import/batch | POST | 处理一个批次 |
//! | /api/import/cleanup | POST | 删除会话与临时目录 |
//! | /api/export | POST | 下载导出包 |
//! | /api/settings | GET, PUT | 自定义 meta / 分类法设置 |

pub mod export;
pub mod health;
pub mod import;
pub mod settings;

use axum::Router;
use http::{HeaderName, HeaderValue};
use tower_http::cors::CorsLayer;
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::core::ServerState;

// Re-export common types for handlers
pub use crate::utils::{ApiResponse, AppError, AppResult};

const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone)]
struct XRequestId;

impl MakeRequestId for XRequestId {
    fn make_request_id<B>(&mut self, _request: &http::Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// All routes, no middleware
pub fn build_router(max_upload_bytes: usize) -> Router<ServerState> {
    Router::new()
        .merge(health::router())
        .merge(import::router(max_upload_bytes))
        .merge(export::router())
        .merge(settings::router())
}

/// Routes with middleware and state applied
pub fn router(state: ServerState) -> Router {
    build_router(state.config.max_upload_bytes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(
            HeaderName::from_static(REQUEST_ID_HEADER),
            XRequestId,
        ))
        .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
            REQUEST_ID_HEADER,
        )))
        .with_state(state)
}
