//! In-process test client: drives an assembled router without binding a
//! port, via `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use aqua_core::http::{Body, Request, Router};
use http_body_util::BodyExt;
use tower::util::ServiceExt;

pub struct TestApp {
    router: Router,
}

pub struct TestResponse {
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("response body is not JSON")
    }
}

impl TestApp {
    pub fn new(server: aqua_core::RestServer) -> TestApp {
        TestApp {
            router: server.into_router().expect("server failed to compile"),
        }
    }

    pub async fn send(&self, req: Request) -> TestResponse {
        let resp = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("failed to send request");
        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = resp
            .into_body()
            .collect()
            .await
            .expect("failed to read response body")
            .to_bytes()
            .to_vec();
        TestResponse {
            status,
            content_type,
            body,
        }
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        let req = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        self.send(req).await
    }

    pub async fn get_with_accept(&self, path: &str, accept: &str) -> TestResponse {
        let req = Request::builder()
            .method("GET")
            .uri(path)
            .header("accept", accept)
            .body(Body::empty())
            .unwrap();
        self.send(req).await
    }

    pub async fn post(&self, path: &str, content_type: &str, body: &str) -> TestResponse {
        let req = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", content_type)
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(req).await
    }

    pub async fn post_json(&self, path: &str, body: &str) -> TestResponse {
        self.post(path, "application/json", body).await
    }

    pub async fn put_json(&self, path: &str, body: &str) -> TestResponse {
        let req = Request::builder()
            .method("PUT")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(req).await
    }

    pub async fn delete(&self, path: &str) -> TestResponse {
        let req = Request::builder()
            .method("DELETE")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        self.send(req).await
    }
}
