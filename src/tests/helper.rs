use axum::Router;
use axum::body::Body;
use axum::body::Bytes;
use axum::http::Method;
use axum::http::Request;
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::http::header::CONTENT_TYPE;
use axum::http::header::LOCATION;
use http_body_util::BodyExt;
use serde_json::Map;
use serde_json::Value;
use tower::Service;
use uuid::Uuid;

use crate::clicks::ClickRecorder;
use crate::create_router;
use crate::storage::Memory;
use crate::users::ensure_initial_user;

/// Test helper version of User struct
#[derive(Debug)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub role: String,
    pub password: Option<String>,
}

/// Test helper version of Link struct
#[derive(Debug)]
pub struct Link {
    pub id: Uuid,
    pub slug: String,
    pub url_template: String,
    pub visibility: String,
}

/// Setup the app around a fresh in-memory storage
///
/// Inject some environment variables to match our tests
pub async fn setup_test_app() -> Router {
    let (app, _storage) = setup_test_app_with_storage().await;

    app
}

/// Inject some environment variables to match our tests
pub fn set_test_env() {
    #[allow(unsafe_code)]
    unsafe {
        std::env::set_var("INITIAL_USERNAME", "admin");
        std::env::set_var("INITIAL_PASSWORD", "verysecret");
        std::env::set_var("JWT_SECRET", "verysecret");
    }
}

/// Same as [`setup_test_app`], but keep a handle on the storage
pub async fn setup_test_app_with_storage() -> (Router, Memory) {
    set_test_env();

    let storage = Memory::new();

    ensure_initial_user(&storage).await.unwrap();

    let click_recorder = ClickRecorder::spawn(storage.clone());

    (create_router(storage.clone(), click_recorder), storage)
}

pub async fn root(app: &mut Router, path: &str) -> (StatusCode, Option<String>, String) {
    let request = Request::builder()
        .method(Method::GET)
        .uri(format!("/{path}"))
        .body(Body::empty())
        .unwrap();

    let response = app.call(request).await.unwrap();

    let status_code = response.status();
    let headers = response.headers();

    let location = headers.get(LOCATION);
    let location = location.map(|header| header.to_str().unwrap().to_string());

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let body = String::from_utf8_lossy(&body[..]).to_string();

    (status_code, location, body)
}

/// Root request flagged as a htmx fragment request
pub async fn root_htmx(app: &mut Router, path: &str) -> (StatusCode, Option<String>) {
    let request = Request::builder()
        .method(Method::GET)
        .uri(format!("/{path}"))
        .header("HX-Request", "true")
        .body(Body::empty())
        .unwrap();

    let response = app.call(request).await.unwrap();

    let status_code = response.status();
    let hx_redirect = response
        .headers()
        .get("HX-Redirect")
        .map(|header| header.to_str().unwrap().to_string());

    (status_code, hx_redirect)
}

/// Root request with an access token attached
pub async fn root_as(
    app: &mut Router,
    access_token: &str,
    path: &str,
) -> (StatusCode, Option<String>) {
    let request = Request::builder()
        .method(Method::GET)
        .uri(format!("/{path}"))
        .header(AUTHORIZATION, access_token)
        .body(Body::empty())
        .unwrap();

    let response = app.call(request).await.unwrap();

    let status_code = response.status();
    let location = response
        .headers()
        .get(LOCATION)
        .map(|header| header.to_str().unwrap().to_string());

    (status_code, location)
}

pub async fn login_with_credentials(
    app: &mut Router,
    username: &str,
    password: &str,
) -> (StatusCode, Option<String>) {
    let mut payload = Map::new();
    payload.insert("username".to_string(), Value::String(username.to_string()));
    payload.insert("password".to_string(), Value::String(password.to_string()));

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/users/token")
        .header(CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
        .body(Body::from(serde_json::to_vec(&payload).unwrap()))
        .unwrap();

    let response = app.call(request).await.unwrap();
    let status_code = response.status();

    let body = response.into_body().collect().await.unwrap().to_bytes();

    (
        status_code,
        if status_code == StatusCode::OK {
            Some(get_access_token(&body))
        } else {
            None
        },
    )
}

pub async fn login(app: &mut Router) -> String {
    let (status_code, access_token) = login_with_credentials(app, "admin", "verysecret").await;

    assert_eq!(StatusCode::OK, status_code);

    access_token.unwrap()
}

pub async fn current_user(app: &mut Router, access_token: &str) -> (StatusCode, Option<User>) {
    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/users/me")
        .header(AUTHORIZATION, access_token)
        .body(Body::empty())
        .unwrap();

    let response = app.call(request).await.unwrap();
    let status_code = response.status();

    let body = response.into_body().collect().await.unwrap().to_bytes();

    (
        status_code,
        if status_code == StatusCode::OK {
            Some(get_user(&body))
        } else {
            None
        },
    )
}

pub async fn maybe_create_user(
    app: &mut Router,
    access_token: &str,
    username: &str,
    role: &str,
) -> (StatusCode, Option<User>, Option<String>) {
    let mut payload = Map::new();
    payload.insert("username".to_string(), Value::String(username.to_string()));
    payload.insert("role".to_string(), Value::String(role.to_string()));

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/users")
        .header(CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
        .header(AUTHORIZATION, access_token)
        .body(Body::from(serde_json::to_vec(&payload).unwrap()))
        .unwrap();

    let response = app.call(request).await.unwrap();
    let status_code = response.status();

    let body = response.into_body().collect().await.unwrap().to_bytes();

    (
        status_code,
        if status_code == StatusCode::CREATED {
            Some(get_user(&body))
        } else {
            None
        },
        if status_code == StatusCode::BAD_REQUEST {
            Some(get_error_message(&body))
        } else {
            None
        },
    )
}

pub async fn maybe_create_link_with_visibility(
    app: &mut Router,
    access_token: &str,
    slug: &str,
    url_template: &str,
    visibility: Option<&str>,
) -> (StatusCode, Option<Link>, Option<String>) {
    let mut payload = Map::new();
    payload.insert("slug".to_string(), Value::String(slug.to_string()));
    payload.insert(
        "urlTemplate".to_string(),
        Value::String(url_template.to_string()),
    );

    if let Some(visibility) = visibility {
        payload.insert(
            "visibility".to_string(),
            Value::String(visibility.to_string()),
        );
    }

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/links")
        .header(CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
        .header(AUTHORIZATION, access_token)
        .body(Body::from(serde_json::to_vec(&payload).unwrap()))
        .unwrap();

    let response = app.call(request).await.unwrap();
    let status_code = response.status();

    let body = response.into_body().collect().await.unwrap().to_bytes();

    (
        status_code,
        if status_code == StatusCode::CREATED {
            Some(get_link(&body))
        } else {
            None
        },
        if status_code == StatusCode::BAD_REQUEST {
            Some(get_error_message(&body))
        } else {
            None
        },
    )
}

pub async fn maybe_create_link(
    app: &mut Router,
    access_token: &str,
    slug: &str,
    url_template: &str,
) -> (StatusCode, Option<Link>, Option<String>) {
    maybe_create_link_with_visibility(app, access_token, slug, url_template, None).await
}

/// Create a link and unwrap, for tests that only need the fixture
pub async fn create_link(
    app: &mut Router,
    access_token: &str,
    slug: &str,
    url_template: &str,
) -> Link {
    let (status_code, link, _) = maybe_create_link(app, access_token, slug, url_template).await;

    assert_eq!(StatusCode::CREATED, status_code);

    link.unwrap()
}

pub async fn list_links(app: &mut Router, access_token: &str) -> (StatusCode, Option<Vec<Link>>) {
    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/links")
        .header(AUTHORIZATION, access_token)
        .body(Body::empty())
        .unwrap();

    let response = app.call(request).await.unwrap();
    let status_code = response.status();

    let body = response.into_body().collect().await.unwrap().to_bytes();

    (
        status_code,
        if status_code == StatusCode::OK {
            Some(get_links(&body))
        } else {
            None
        },
    )
}

pub async fn single_link(
    app: &mut Router,
    access_token: &str,
    id: &Uuid,
) -> (StatusCode, Option<Link>) {
    let request = Request::builder()
        .method(Method::GET)
        .uri(format!("/api/links/{id}"))
        .header(AUTHORIZATION, access_token)
        .body(Body::empty())
        .unwrap();

    let response = app.call(request).await.unwrap();
    let status_code = response.status();

    let body = response.into_body().collect().await.unwrap().to_bytes();

    (
        status_code,
        if status_code == StatusCode::OK {
            Some(get_link(&body))
        } else {
            None
        },
    )
}

pub async fn maybe_update_link(
    app: &mut Router,
    access_token: &str,
    id: &Uuid,
    payload: Map<String, Value>,
) -> (StatusCode, Option<Link>) {
    let request = Request::builder()
        .method(Method::PATCH)
        .uri(format!("/api/links/{id}"))
        .header(CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
        .header(AUTHORIZATION, access_token)
        .body(Body::from(serde_json::to_vec(&payload).unwrap()))
        .unwrap();

    let response = app.call(request).await.unwrap();
    let status_code = response.status();

    let body = response.into_body().collect().await.unwrap().to_bytes();

    (
        status_code,
        if status_code == StatusCode::OK {
            Some(get_link(&body))
        } else {
            None
        },
    )
}

pub async fn delete_link(app: &mut Router, access_token: &str, id: &Uuid) -> StatusCode {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri(format!("/api/links/{id}"))
        .header(AUTHORIZATION, access_token)
        .body(Body::empty())
        .unwrap();

    let response = app.call(request).await.unwrap();

    response.status()
}

/// POST a user grant to a link relation endpoint: `owners` or `shares`
pub async fn add_grant(
    app: &mut Router,
    access_token: &str,
    link_id: &Uuid,
    relation: &str,
    user_id: &Uuid,
) -> StatusCode {
    let mut payload = Map::new();
    payload.insert("userId".to_string(), Value::String(user_id.to_string()));

    let request = Request::builder()
        .method(Method::POST)
        .uri(format!("/api/links/{link_id}/{relation}"))
        .header(CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
        .header(AUTHORIZATION, access_token)
        .body(Body::from(serde_json::to_vec(&payload).unwrap()))
        .unwrap();

    let response = app.call(request).await.unwrap();

    response.status()
}

/// DELETE a user grant from a link relation endpoint: `owners` or `shares`
pub async fn remove_grant(
    app: &mut Router,
    access_token: &str,
    link_id: &Uuid,
    relation: &str,
    user_id: &Uuid,
) -> StatusCode {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri(format!("/api/links/{link_id}/{relation}/{user_id}"))
        .header(AUTHORIZATION, access_token)
        .body(Body::empty())
        .unwrap();

    let response = app.call(request).await.unwrap();

    response.status()
}

/// Count the rows of a link relation endpoint: `owners` or `shares`
pub async fn count_grants(
    app: &mut Router,
    access_token: &str,
    link_id: &Uuid,
    relation: &str,
) -> usize {
    let request = Request::builder()
        .method(Method::GET)
        .uri(format!("/api/links/{link_id}/{relation}"))
        .header(AUTHORIZATION, access_token)
        .body(Body::empty())
        .unwrap();

    let response = app.call(request).await.unwrap();

    assert_eq!(StatusCode::OK, response.status());

    let body = response.into_body().collect().await.unwrap().to_bytes();

    serde_json::from_slice::<Value>(&body[..]).unwrap()["data"]
        .as_array()
        .unwrap()
        .len()
}

pub async fn set_tags(
    app: &mut Router,
    access_token: &str,
    link_id: &Uuid,
    tags: &[&str],
) -> StatusCode {
    let mut payload = Map::new();
    payload.insert(
        "tags".to_string(),
        Value::Array(
            tags.iter()
                .map(|tag| Value::String((*tag).to_string()))
                .collect(),
        ),
    );

    let request = Request::builder()
        .method(Method::PUT)
        .uri(format!("/api/links/{link_id}/tags"))
        .header(CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
        .header(AUTHORIZATION, access_token)
        .body(Body::from(serde_json::to_vec(&payload).unwrap()))
        .unwrap();

    let response = app.call(request).await.unwrap();

    response.status()
}

pub async fn get_tags(app: &mut Router, access_token: &str, link_id: &Uuid) -> Vec<String> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(format!("/api/links/{link_id}/tags"))
        .header(AUTHORIZATION, access_token)
        .body(Body::empty())
        .unwrap();

    let response = app.call(request).await.unwrap();

    assert_eq!(StatusCode::OK, response.status());

    let body = response.into_body().collect().await.unwrap().to_bytes();

    serde_json::from_slice::<Value>(&body[..]).unwrap()["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|tag| tag["name"].as_str().unwrap().to_string())
        .collect()
}

pub async fn maybe_create_keyword(
    app: &mut Router,
    access_token: &str,
    keyword: &str,
    url_template: &str,
) -> (StatusCode, Option<String>) {
    let mut payload = Map::new();
    payload.insert("keyword".to_string(), Value::String(keyword.to_string()));
    payload.insert(
        "urlTemplate".to_string(),
        Value::String(url_template.to_string()),
    );

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/keywords")
        .header(CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
        .header(AUTHORIZATION, access_token)
        .body(Body::from(serde_json::to_vec(&payload).unwrap()))
        .unwrap();

    let response = app.call(request).await.unwrap();
    let status_code = response.status();

    let body = response.into_body().collect().await.unwrap().to_bytes();

    (
        status_code,
        if status_code == StatusCode::BAD_REQUEST {
            Some(get_error_message(&body))
        } else {
            None
        },
    )
}

pub async fn delete_keyword(app: &mut Router, access_token: &str, keyword: &str) -> StatusCode {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri(format!("/api/keywords/{keyword}"))
        .header(AUTHORIZATION, access_token)
        .body(Body::empty())
        .unwrap();

    let response = app.call(request).await.unwrap();

    response.status()
}

fn value_to_user(user: &Map<String, Value>) -> User {
    User {
        id: user["id"].as_str().map(Uuid::parse_str).unwrap().unwrap(),
        username: user["username"].as_str().map(ToString::to_string).unwrap(),
        role: user["role"].as_str().map(ToString::to_string).unwrap(),
        password: user
            .get("password")
            .and_then(Value::as_str)
            .map(ToString::to_string),
    }
}

fn get_user(body: &Bytes) -> User {
    serde_json::from_slice::<Value>(&body[..]).unwrap()["data"]
        .as_object()
        .map(value_to_user)
        .unwrap()
}

fn value_to_link(link: &Map<String, Value>) -> Link {
    Link {
        id: link["id"].as_str().map(Uuid::parse_str).unwrap().unwrap(),
        slug: link["slug"].as_str().map(ToString::to_string).unwrap(),
        url_template: link["urlTemplate"]
            .as_str()
            .map(ToString::to_string)
            .unwrap(),
        visibility: link["visibility"]
            .as_str()
            .map(ToString::to_string)
            .unwrap(),
    }
}

fn get_link(body: &Bytes) -> Link {
    serde_json::from_slice::<Value>(&body[..]).unwrap()["data"]
        .as_object()
        .map(value_to_link)
        .unwrap()
}

fn get_links(body: &Bytes) -> Vec<Link> {
    serde_json::from_slice::<Value>(&body[..]).unwrap()["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f.as_object().unwrap())
        .map(value_to_link)
        .collect()
}

fn get_error_message(body: &Bytes) -> String {
    serde_json::from_slice::<Value>(&body[..]).unwrap()["error"]
        .as_str()
        .map(ToString::to_string)
        .unwrap()
}

fn get_access_token(body: &Bytes) -> String {
    serde_json::from_slice::<Value>(&body[..]).unwrap()["data"]["access_token"]
        .as_str()
        .map(|access_token| format!("Bearer {access_token}"))
        .unwrap()
}
