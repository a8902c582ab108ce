//! Test Helper Utilities
//!
//! Shared utilities for the gabinete-server HTTP tests

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request},
    Router,
};
use gabinete_server::{build_router, AppState};
use serde_json::Value;
use sqlx::SqlitePool;
use std::io::Cursor;
use tempfile::TempDir;

pub const ADMIN_KEY: &str = "clave-de-prueba";

/// Router over a fresh data root; keep the `TempDir` alive for the test
pub async fn setup_app() -> (TempDir, Router) {
    let (dir, _pool, app) = setup_app_with_pool().await;
    (dir, app)
}

/// Same as [`setup_app`], also handing back the pool behind the router
pub async fn setup_app_with_pool() -> (TempDir, SqlitePool, Router) {
    let dir = TempDir::new().expect("Should create temp dir");
    let pool = gabinete_common::db::init_database(&dir.path().join("gabinete.db"))
        .await
        .expect("Should initialize database");
    let state = AppState::new(pool.clone(), dir.path().to_path_buf(), ADMIN_KEY.to_string());
    (dir, pool, build_router(state))
}

/// Number of files under `<root>/uploads/<kind>`
pub fn stored_files(root: &std::path::Path, kind: &str) -> usize {
    std::fs::read_dir(root.join("uploads").join(kind))
        .map(|d| d.count())
        .unwrap_or(0)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn admin_get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("x-admin-key", ADMIN_KEY)
        .body(Body::empty())
        .unwrap()
}

pub fn put_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// PUT with a raw body labelled as JSON
pub fn put_raw_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn admin_put_json(uri: &str, body: &Value) -> Request<Body> {
    let mut request = put_json(uri, body);
    request
        .headers_mut()
        .insert("x-admin-key", ADMIN_KEY.parse().unwrap());
    request
}

pub async fn body_bytes(body: Body) -> Vec<u8> {
    axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body")
        .to_vec()
}

/// Extract JSON body from response
pub async fn extract_json(body: Body) -> Value {
    serde_json::from_slice(&body_bytes(body).await).expect("Should parse JSON")
}

/// Small decodable PNG
pub fn png_bytes() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(5, 5, image::Rgb([10, 120, 200]));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png)
        .expect("Should encode PNG");
    buf.into_inner()
}

/// `n` space-separated words
pub fn words(n: usize) -> String {
    vec!["palabra"; n].join(" ")
}

/// Hand-built multipart/form-data body
pub struct MultipartForm {
    boundary: String,
    body: Vec<u8>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self {
            boundary: "gabinete-test-boundary".to_string(),
            body: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                self.boundary, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                self.boundary, name, file_name, content_type
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    /// Form with every required field filled
    pub fn valid(name: &str) -> Self {
        Self::new()
            .text("student_name", name)
            .text("email", &format!("{}@example.com", name.to_lowercase()))
            .text("artifact_title", &format!("Obra de {}", name))
            .text("artifact_desc", "Caja con objetos encontrados")
    }

    pub fn into_request(mut self, uri: &str) -> Request<Body> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", self.boundary),
            )
            .body(Body::from(self.body))
            .unwrap()
    }
}

/// Sensing payload that passes validation
pub fn sensing_payload(word_count: usize) -> Value {
    serde_json::json!({
        "snapshot": words(word_count),
        "valence": "mixed",
        "evidence_url": "https://example.com/foto",
    })
}

pub fn probing_payload() -> Value {
    serde_json::json!({
        "hypothesis": "La asistencia baja cuando llueve",
        "data_plan": [
            { "data": "asistencia", "source": "lista diaria", "owner": "Ana", "due": "2026-11-01" },
            { "data": "", "source": "", "owner": "" }
        ],
    })
}
