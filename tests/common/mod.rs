//! Shared harness: a full router over a throwaway SQLite file.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use clap::Parser;
use loja_backend::{auth::KeyManager, bootstrap, build_router, Config};
use serde_json::Value;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tower::ServiceExt;

pub const ADMIN_EMAIL: &str = "root@loja.test";
pub const ADMIN_PASSWORD: &str = "rootpass";

pub struct TestApp {
    pub router: Router,
    pub keys: Arc<KeyManager>,
    _db: NamedTempFile,
}

pub async fn spawn_app() -> TestApp {
    let db = NamedTempFile::new().expect("temp db");
    let db_path = db.path().to_str().expect("utf-8 path").to_string();

    let config = Config::try_parse_from([
        "loja",
        "--database-path",
        db_path.as_str(),
        "--bcrypt-cost",
        "4",
        "--cache-enabled",
        "true",
        "--admin-email",
        ADMIN_EMAIL,
        "--admin-password",
        ADMIN_PASSWORD,
    ])
    .expect("test config");
    config.validate().expect("valid config");

    let app = bootstrap(&config).await.expect("bootstrap");
    TestApp {
        router: build_router(app.state),
        keys: app.keys,
        _db: db,
    }
}

pub struct Reply {
    pub status: StatusCode,
    pub raw: String,
    pub body: Value,
}

impl Reply {
    pub fn error_code(&self) -> &str {
        self.body["error"].as_str().unwrap_or_default()
    }

    pub fn token(&self) -> String {
        self.body["data"]["token"]
            .as_str()
            .expect("token in response")
            .to_string()
    }
}

impl TestApp {
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Reply {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let resp = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let raw = String::from_utf8(bytes.to_vec()).unwrap();
        let body = serde_json::from_str(&raw).unwrap_or(Value::Null);
        Reply { status, raw, body }
    }

    pub async fn register(&self, email: &str, password: &str) -> Reply {
        self.send(
            Method::POST,
            "/api/v1/register",
            None,
            Some(serde_json::json!({ "email": email, "password": password, "name": "Test User" })),
        )
        .await
    }

    pub async fn login(&self, email: &str, password: &str) -> Reply {
        self.send(
            Method::POST,
            "/api/v1/login",
            None,
            Some(serde_json::json!({ "email": email, "password": password })),
        )
        .await
    }

    pub async fn admin_token(&self) -> String {
        let reply = self.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;
        assert_eq!(reply.status, StatusCode::OK, "{}", reply.raw);
        reply.token()
    }

    pub async fn user_token(&self, email: &str) -> (i64, String) {
        let reply = self.register(email, "secret1").await;
        assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.raw);
        let id = reply.body["data"]["user"]["id"].as_i64().expect("user id");
        (id, reply.token())
    }
}
