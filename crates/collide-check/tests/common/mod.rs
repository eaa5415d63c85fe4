#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use collide_check::errors::TransportError;
use collide_check::transport::{PreparedRequest, RawResponse, Transport};
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

pub const PLAIN_TEXT_CONTENT_ID: i64 = 500;
pub const FOREIGN_JSON_CONTENT_ID: i64 = 502;
pub const SLOW_CONTENT_ID: i64 = 504;

const KNOWN_TARGETS: &[i64] = &[101, 107, 108, 109, 110, 111];

pub mod server_utils {
    use super::*;

    /// In-process stand-in for the collide service, seeded with the records
    /// the default fixtures point at.
    #[derive(Clone)]
    pub struct StubState {
        comments: Arc<Mutex<Vec<Value>>>,
        list_hits: Arc<AtomicUsize>,
    }

    impl StubState {
        fn seeded() -> Self {
            let comments = vec![
                json!({"id": 101, "commentType": "CONTENT", "targetId": 101, "parentCommentId": 0,
                       "content": "精彩的内容", "userId": 101}),
                json!({"id": 102, "commentType": "CONTENT", "targetId": 101, "parentCommentId": 101,
                       "content": "agreed", "userId": 102}),
                json!({"id": 103, "commentType": "DYNAMIC", "targetId": 101, "parentCommentId": 0,
                       "content": "nice update", "userId": 103}),
            ];

            Self {
                comments: Arc::new(Mutex::new(comments)),
                list_hits: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    pub struct StubServer {
        pub base_url: String,
        state: StubState,
        handle: JoinHandle<()>,
    }

    impl StubServer {
        pub fn list_hits(&self) -> usize {
            self.state.list_hits.load(Ordering::SeqCst)
        }

        pub fn comment_count(&self) -> usize {
            self.state.comments.lock().unwrap().len()
        }
    }

    impl Drop for StubServer {
        fn drop(&mut self) {
            self.handle.abort();
        }
    }

    pub async fn spawn_stub() -> StubServer {
        let state = StubState::seeded();
        let app = Router::new()
            .route("/api/v1/content/core/{contentId}", get(content_detail))
            .route("/api/v1/comments/list", get(list_comments))
            .route("/api/v1/comments/create", post(create_comment))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind stub listener");
        let address = listener.local_addr().expect("Stub listener has no address");

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Stub server failed");
        });

        StubServer {
            base_url: format!("http://{address}"),
            state,
            handle,
        }
    }

    /// A base URL nothing listens on
    pub async fn refused_base_url() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind probe listener");
        let address = listener.local_addr().expect("Probe listener has no address");
        drop(listener);
        format!("http://{address}")
    }

    async fn content_detail(
        Path(content_id): Path<i64>,
        Query(params): Query<HashMap<String, String>>,
    ) -> Response {
        match content_id {
            PLAIN_TEXT_CONTENT_ID => (StatusCode::OK, "service under maintenance").into_response(),
            FOREIGN_JSON_CONTENT_ID => Json(json!({"status": "UP"})).into_response(),
            SLOW_CONTENT_ID => {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Json(json!({"success": true, "data": {"id": content_id}})).into_response()
            }
            107..=111 => {
                let mut data = json!({
                    "id": content_id,
                    "title": format!("Content {content_id}"),
                    "contentType": "NOVEL",
                    "status": "PUBLISHED",
                });
                if params.contains_key("userId") {
                    data["isLiked"] = json!(false);
                    data["isFavorited"] = json!(false);
                    data["isFollowed"] = json!(false);
                }
                Json(json!({"success": true, "code": "SUCCESS", "data": data})).into_response()
            }
            _ => Json(json!({"success": false, "code": "ERROR", "message": "content not found"}))
                .into_response(),
        }
    }

    async fn list_comments(
        State(state): State<StubState>,
        Query(params): Query<HashMap<String, String>>,
    ) -> Json<Value> {
        state.list_hits.fetch_add(1, Ordering::SeqCst);

        let matches = |comment: &Value, key: &str, field: &str| match params.get(key) {
            Some(expected) => match &comment[field] {
                Value::String(actual) => actual == expected,
                other => &other.to_string() == expected,
            },
            None => true,
        };

        let comments = state.comments.lock().unwrap();
        let records: Vec<Value> = comments
            .iter()
            .filter(|comment| {
                matches(comment, "targetId", "targetId")
                    && matches(comment, "commentType", "commentType")
                    && matches(comment, "userId", "userId")
                    && matches(comment, "parentId", "parentCommentId")
            })
            .filter(|comment| match params.get("keyword") {
                Some(keyword) => comment["content"]
                    .as_str()
                    .is_some_and(|content| content.contains(keyword.as_str())),
                None => true,
            })
            .cloned()
            .collect();

        let current_page: usize = params
            .get("currentPage")
            .and_then(|page| page.parse().ok())
            .unwrap_or(1);
        let page_size: usize = params
            .get("pageSize")
            .and_then(|size| size.parse().ok())
            .unwrap_or(20);
        let page: Vec<Value> = records
            .iter()
            .skip((current_page.max(1) - 1) * page_size)
            .take(page_size)
            .cloned()
            .collect();

        Json(json!({
            "success": true,
            "data": {
                "records": page,
                "total": records.len(),
                "currentPage": current_page,
                "pageSize": page_size,
            }
        }))
    }

    async fn create_comment(
        State(state): State<StubState>,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        let reject = |message: &str| Json(json!({"success": false, "message": message}));

        let comment_type = body["commentType"].as_str().unwrap_or_default();
        if !matches!(comment_type, "CONTENT" | "DYNAMIC") {
            return reject("invalid comment type");
        }
        let Some(target_id) = body["targetId"].as_i64() else {
            return reject("targetId is required");
        };
        if !KNOWN_TARGETS.contains(&target_id) {
            return reject("target does not exist");
        }
        let Some(content) = body["content"].as_str().filter(|c| !c.trim().is_empty()) else {
            return reject("content must not be blank");
        };
        let Some(user_id) = body["userId"].as_i64() else {
            return reject("userId is required");
        };

        let mut comments = state.comments.lock().unwrap();
        let comment = json!({
            "id": 1000 + comments.len() as i64,
            "commentType": comment_type,
            "targetId": target_id,
            "parentCommentId": body["parentCommentId"].as_i64().unwrap_or(0),
            "content": content,
            "userId": user_id,
        });
        comments.push(comment.clone());

        Json(json!({"success": true, "data": comment}))
    }
}

pub mod transport_utils {
    use super::*;

    /// Replays canned results in order and records what was sent
    #[derive(Default)]
    pub struct ScriptedTransport {
        script: Mutex<VecDeque<Result<RawResponse, TransportError>>>,
        requests: Mutex<Vec<PreparedRequest>>,
    }

    impl ScriptedTransport {
        pub fn new(script: Vec<Result<RawResponse, TransportError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn requests(&self) -> Vec<PreparedRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn execute(&self, request: &PreparedRequest) -> Result<RawResponse, TransportError> {
            self.requests.lock().unwrap().push(request.clone());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Other("script exhausted".to_string())))
        }
    }

    pub fn json_response(status: u16, body: Value) -> RawResponse {
        RawResponse {
            status: http::StatusCode::from_u16(status).unwrap(),
            content_type: Some("application/json".to_string()),
            body: body.to_string(),
            elapsed: Duration::from_millis(5),
        }
    }

    pub fn text_response(status: u16, body: &str) -> RawResponse {
        RawResponse {
            status: http::StatusCode::from_u16(status).unwrap(),
            content_type: Some("text/plain".to_string()),
            body: body.to_string(),
            elapsed: Duration::from_millis(5),
        }
    }
}
