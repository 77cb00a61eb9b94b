//! 测试用 HTTP 桩服务：axum fallback 路由记录每个请求，由闭包决定状态码与响应体

use std::sync::{Arc, Mutex};

use axum::{
    body::to_bytes,
    extract::{Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use tokio::net::TcpListener;

/// 记录到的请求，按 `METHOD path?query` + 头 + 空行 + 体 拼成文本
pub(crate) type Captured = Arc<Mutex<Vec<String>>>;

type Handler = Arc<dyn Fn(&str) -> (u16, String) + Send + Sync>;

#[derive(Clone)]
struct StubState {
    handler: Handler,
    captured: Captured,
}

/// 启动桩服务，返回 base url（http://127.0.0.1:port）与请求记录
pub(crate) async fn spawn_http_stub<F>(handler: F) -> (String, Captured)
where
    F: Fn(&str) -> (u16, String) + Send + Sync + 'static,
{
    let captured: Captured = Arc::default();
    let state = StubState {
        handler: Arc::new(handler),
        captured: Arc::clone(&captured),
    };
    let app = Router::new().fallback(respond).with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (format!("http://{}", addr), captured)
}

async fn respond(State(state): State<StubState>, req: Request) -> Response {
    let (parts, body) = req.into_parts();
    let body = to_bytes(body, usize::MAX).await.unwrap_or_default();

    let target = parts.uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    let mut raw = format!("{} {} HTTP/1.1\r\n", parts.method, target);
    for (name, value) in &parts.headers {
        raw.push_str(&format!("{}: {}\r\n", name, String::from_utf8_lossy(value.as_bytes())));
    }
    raw.push_str("\r\n");
    raw.push_str(&String::from_utf8_lossy(&body));

    state.captured.lock().unwrap().push(raw.clone());
    let (status, body) = (state.handler)(&raw);
    (
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response()
}
