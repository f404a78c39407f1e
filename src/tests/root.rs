use axum::http::StatusCode;

use crate::tests::helper;

#[tokio::test]
async fn test_root() {
    let mut app = helper::setup_test_app().await;

    let (status_code, location, _) = helper::root(&mut app, "").await;
    assert_eq!(StatusCode::NOT_FOUND, status_code);
    assert_eq!(None, location);
}

#[tokio::test]
async fn test_root_with_valid_utf8() {
    let mut app = helper::setup_test_app().await;

    let (status_code, location, _) = helper::root(&mut app, "%20").await;
    assert_eq!(StatusCode::NOT_FOUND, status_code);
    assert_eq!(None, location);
}

#[tokio::test]
async fn test_root_with_invalid_utf8() {
    let mut app = helper::setup_test_app().await;

    let (status_code, location, body) = helper::root(&mut app, "%c0").await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);
    assert_eq!(None, location);
    assert!(body.contains("URL contains invalid UTF-8 characters"));
}

#[tokio::test]
async fn test_root_redirects_to_known_slug() {
    let mut app = helper::setup_test_app().await;
    let access_token = helper::login(&mut app).await;

    helper::create_link(&mut app, &access_token, "wiki", "https://wiki.example.com/").await;

    let (status_code, location, _) = helper::root(&mut app, "wiki").await;
    assert_eq!(StatusCode::FOUND, status_code);
    assert_eq!(Some("https://wiki.example.com/".to_string()), location);
}

#[tokio::test]
async fn test_root_unknown_slug_is_not_found() {
    let mut app = helper::setup_test_app().await;

    let (status_code, location, _) = helper::root(&mut app, "nope").await;
    assert_eq!(StatusCode::NOT_FOUND, status_code);
    assert_eq!(None, location);
}

#[tokio::test]
async fn test_root_substitutes_variables() {
    let mut app = helper::setup_test_app().await;
    let access_token = helper::login(&mut app).await;

    helper::create_link(
        &mut app,
        &access_token,
        "github",
        "https://github.com/$username",
    )
    .await;

    let (status_code, location, _) = helper::root(&mut app, "github/joestump").await;
    assert_eq!(StatusCode::FOUND, status_code);
    assert_eq!(Some("https://github.com/joestump".to_string()), location);
}

#[tokio::test]
async fn test_root_keeps_encoded_slash_in_one_variable() {
    let mut app = helper::setup_test_app().await;
    let access_token = helper::login(&mut app).await;

    helper::create_link(&mut app, &access_token, "q", "https://example.com/?q=$query").await;

    let (status_code, location, _) = helper::root(&mut app, "q/a%2Fb").await;
    assert_eq!(StatusCode::FOUND, status_code);
    assert_eq!(Some("https://example.com/?q=a%2Fb".to_string()), location);
}

#[tokio::test]
async fn test_root_arity_mismatch_is_not_found() {
    let mut app = helper::setup_test_app().await;
    let access_token = helper::login(&mut app).await;

    helper::create_link(
        &mut app,
        &access_token,
        "github",
        "https://github.com/$username",
    )
    .await;

    let (status_code, location, _) = helper::root(&mut app, "github/joestump/extra").await;
    assert_eq!(StatusCode::NOT_FOUND, status_code);
    assert_eq!(None, location);
}

#[tokio::test]
async fn test_root_exact_match_wins_over_prefix() {
    let mut app = helper::setup_test_app().await;
    let access_token = helper::login(&mut app).await;

    helper::create_link(
        &mut app,
        &access_token,
        "github",
        "https://github.com/$username",
    )
    .await;
    helper::create_link(
        &mut app,
        &access_token,
        "github/joestump",
        "https://example.com/joe",
    )
    .await;

    let (status_code, location, _) = helper::root(&mut app, "github/joestump").await;
    assert_eq!(StatusCode::FOUND, status_code);
    assert_eq!(Some("https://example.com/joe".to_string()), location);
}

#[tokio::test]
async fn test_root_htmx_request_gets_hx_redirect() {
    let mut app = helper::setup_test_app().await;
    let access_token = helper::login(&mut app).await;

    helper::create_link(&mut app, &access_token, "wiki", "https://wiki.example.com/").await;

    let (status_code, hx_redirect) = helper::root_htmx(&mut app, "wiki").await;
    assert_eq!(StatusCode::NO_CONTENT, status_code);
    assert_eq!(Some("https://wiki.example.com/".to_string()), hx_redirect);
}

#[tokio::test]
async fn test_root_htmx_request_not_found_without_hx_redirect() {
    let mut app = helper::setup_test_app().await;

    let (status_code, hx_redirect) = helper::root_htmx(&mut app, "nope").await;
    assert_eq!(StatusCode::NOT_FOUND, status_code);
    assert_eq!(None, hx_redirect);
}
