use std::fs;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt as _;
use serde_json::{Value, json};
use tower::ServiceExt as _;

use folio::app::{AppState, IdentitySource, router};
use folio::content::{Catalog, LocalFsContentStore};
use folio::guard::{GuardConfig, SessionStore, Viewer};
use folio::messages::LocalFsMessageStore;

fn seed(dir: &std::path::Path) {
    let projects = json!([
        {
            "id": "p-draft",
            "title": "Draft",
            "slug": "draft",
            "summary": "Not yet.",
            "status": "draft",
        },
        {
            "id": "p-plain",
            "title": "Plain",
            "slug": "plain",
            "summary": "No case study.",
        },
        {
            "id": "p-folio",
            "title": "Folio",
            "slug": "folio",
            "summary": "Portfolio site.",
            "status": "published",
            "featured": true,
            "featured_order": 1,
            "case_study_md": "Intro.\n## Problem\nDetails.\n### Scope\nSmall.\n## Problem\nAgain.\n",
            "media": [
                { "id": "m2", "type": "video", "url": "/media/demo.mp4", "sort_order": 2 },
                { "id": "m1", "type": "image", "url": "/media/cover.png", "sort_order": 1 },
            ],
        },
    ]);
    let skills = json!([
        { "id": "s1", "name": "Rust", "category": "backend", "proficiency": "Expert", "sort_order": 1 },
        { "id": "s2", "name": "CSS", "category": "frontend", "proficiency": "Advanced", "sort_order": 2 },
    ]);
    fs::write(dir.join("projects.json"), projects.to_string()).expect("write projects");
    fs::write(dir.join("skills.json"), skills.to_string()).expect("write skills");
}

fn app(dir: &std::path::Path, session: SessionStore) -> Router {
    router(AppState {
        catalog: Catalog::new(Arc::new(LocalFsContentStore::new(dir))),
        messages: Arc::new(LocalFsMessageStore::new(dir)),
        identity: IdentitySource::Session(session),
        guard: GuardConfig::default(),
    })
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("route request");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("build request")
}

fn with_json(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("build request")
}

#[tokio::test]
async fn public_catalog_hides_drafts_and_orders_featured_first() {
    let temp = tempfile::TempDir::new().expect("tempdir");
    seed(temp.path());
    let app = app(temp.path(), SessionStore::new());

    let (status, body) = send(&app, get("/api/projects")).await;
    assert_eq!(status, StatusCode::OK);
    let slugs = body
        .as_array()
        .expect("project list")
        .iter()
        .map(|p| p["slug"].as_str().unwrap_or_default())
        .collect::<Vec<_>>();
    assert_eq!(slugs, vec!["folio", "plain"]);

    let (status, _) = send(&app, get("/api/projects/draft")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, get("/api/projects/featured")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(1));

    let (status, body) = send(&app, get("/api/projects/folio/media")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["id"], "m1");
    assert_eq!(body[1]["type"], "video");

    let (status, body) = send(&app, get("/api/skills?category=backend")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(1));
    assert_eq!(body[0]["name"], "Rust");

    let (status, body) = send(&app, get("/api/experiences")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn case_study_outline_carries_unique_anchors() {
    let temp = tempfile::TempDir::new().expect("tempdir");
    seed(temp.path());
    let app = app(temp.path(), SessionStore::new());

    let (status, body) = send(&app, get("/api/projects/folio/case-study")).await;
    assert_eq!(status, StatusCode::OK);
    let contents = body["contents"]
        .as_array()
        .expect("contents")
        .iter()
        .map(|h| h["id"].as_str().unwrap_or_default())
        .collect::<Vec<_>>();
    assert_eq!(contents, vec!["problem", "problem-2"]);
    assert_eq!(body["subheadings"][0]["id"], "scope");
    assert_eq!(body["sections"][0]["title"], "Overview");
    let problem_html = body["sections"][1]["html"].as_str().unwrap_or_default();
    assert!(problem_html.contains("<h3 id=\"scope\">Scope</h3>"), "{problem_html}");

    let (status, body) = send(&app, get("/api/projects/plain/case-study")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sections"], json!([]));

    let (status, _) = send(&app, get("/api/projects/missing/case-study")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn contact_form_validates_input() {
    let temp = tempfile::TempDir::new().expect("tempdir");
    let app = app(temp.path(), SessionStore::new());

    let (status, body) = send(
        &app,
        with_json(
            "POST",
            "/api/messages",
            json!({ "name": "Ada", "email": "ada@example.com", "message": "Hello" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "unread");

    let response = app
        .clone()
        .oneshot(with_json(
            "POST",
            "/api/messages",
            json!({ "name": "Ada", "email": "nope", "message": "Hello" }),
        ))
        .await
        .expect("route request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_routes_redirect_unless_an_admin_is_signed_in() {
    let temp = tempfile::TempDir::new().expect("tempdir");
    let session = SessionStore::with_admins(["owner"]);
    let app = app(temp.path(), session.clone());

    let response = app
        .clone()
        .oneshot(get("/api/admin/messages"))
        .await
        .expect("route request");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(header::LOCATION).and_then(|v| v.to_str().ok()),
        Some("/admin/login")
    );

    session
        .sign_in(Viewer {
            id: "guest".to_owned(),
            email: None,
        })
        .await;
    let (status, _) = send(&app, get("/api/admin/messages")).await;
    assert_eq!(status, StatusCode::SEE_OTHER);

    session
        .sign_in(Viewer {
            id: "owner".to_owned(),
            email: Some("owner@example.com".to_owned()),
        })
        .await;
    let (status, sent) = send(
        &app,
        with_json(
            "POST",
            "/api/messages",
            json!({ "name": "Ada", "email": "ada@example.com", "message": "Hello" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = sent["id"].as_str().expect("message id").to_owned();

    let (status, body) = send(&app, get("/api/admin/messages")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["id"], id.as_str());

    let (status, body) = send(
        &app,
        with_json(
            "PUT",
            &format!("/api/admin/messages/{id}/status"),
            json!({ "status": "replied" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "replied");

    let (status, _) = send(
        &app,
        with_json(
            "PUT",
            &format!("/api/admin/messages/{id}/status"),
            json!({ "status": "archived" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let delete = Request::builder()
        .method("DELETE")
        .uri(format!("/api/admin/messages/{id}"))
        .body(Body::empty())
        .expect("build request");
    let (status, _) = send(&app, delete).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, get(&format!("/api/admin/messages/{id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    session.sign_out().await;
    let (status, _) = send(&app, get("/api/admin/messages")).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
}
