//! The root!
//!
//! The most important part: the actual redirect logic. All wildcard
//! requests end up here and are handed to the resolver.

use std::str::Utf8Error;

use axum::Extension;
use axum::http::HeaderMap;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::http::Uri;
use axum::http::header::LOCATION;
use axum::http::header::REFERER;
use axum_extra::TypedHeader;
use axum_extra::headers::Host;
use axum_extra::headers::UserAgent;
use percent_encoding::NON_ALPHANUMERIC;
use percent_encoding::percent_decode_str;
use percent_encoding::utf8_percent_encode;

use crate::api::CurrentUser;
use crate::clicks;
use crate::clicks::ClickEvent;
use crate::clicks::ClickRecorder;
use crate::client_ip::ClientIp;
use crate::resolver;
use crate::resolver::Outcome;
use crate::storage::Storage;

/// Fragment-oriented requests (htmx) flag themselves with this header...
const HX_REQUEST: &str = "hx-request";

/// ...and get their redirect back in this one, on a `204`
const HX_REDIRECT: &str = "hx-redirect";

/// Resolve a wildcard request into a redirect, a not-found or a forbidden
///
/// Paths that do not percent-decode to valid UTF-8 are rejected here; the
/// resolver then decodes segment by segment and re-escapes whatever it
/// splices into a URL template. Click events are enqueued without blocking
/// and can never fail the response.
pub async fn root<S: Storage>(
    Extension(storage): Extension<S>,
    Extension(click_recorder): Extension<ClickRecorder>,
    current_user: Option<CurrentUser<S>>,
    ip_address: Option<ClientIp>,
    user_agent: Option<TypedHeader<UserAgent>>,
    host: Option<TypedHeader<Host>>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<(StatusCode, HeaderMap), (StatusCode, String)> {
    let path = url_decode_path(uri.path()).map_err(invalid_path)?;
    let host = host.map_or_else(String::new, |TypedHeader(host)| host.to_string());

    tracing::debug!("Resolving path: {path}");

    // the resolver gets the raw path; it decodes per segment
    let outcome = resolver::resolve(
        &storage,
        uri.path(),
        &host,
        current_user.as_deref(),
    )
    .await
    .map_err(internal_error)?;

    let mut response_headers = HeaderMap::new();

    let status_code = match outcome {
        Outcome::Redirect { target, link_id } => {
            tracing::debug!("Redirecting {path} to {target}");

            if let Some(link_id) = link_id {
                click_recorder.record(ClickEvent {
                    link_id,
                    user_id: current_user.map(|user| user.id),
                    ip_hash: ip_address
                        .map(|ip_address| clicks::hash_ip(&ip_address.ip_address.0)),
                    user_agent: user_agent
                        .map(|TypedHeader(user_agent)| clicks::clean_user_agent(user_agent.as_str())),
                    referrer: headers
                        .get(REFERER)
                        .and_then(|referrer| referrer.to_str().ok())
                        .map(clicks::clean_referrer),
                });
            }

            redirect(&mut response_headers, &headers, &target)?
        }

        Outcome::LoginRequired { return_to } => {
            let target = format!(
                "{}?redirect={}",
                resolver::LOGIN_PATH,
                utf8_percent_encode(&return_to, NON_ALPHANUMERIC)
            );

            redirect(&mut response_headers, &headers, &target)?
        }

        Outcome::Forbidden => StatusCode::FORBIDDEN,

        Outcome::NotFound => {
            tracing::debug!("Path {path} not found");

            StatusCode::NOT_FOUND
        }
    };

    Ok((status_code, response_headers))
}

/// Fill in the redirect headers and pick the status code
///
/// Plain requests get a `302` with a `Location`; fragment requests get a
/// `204` with an `HX-Redirect` so htmx performs a full page navigation.
fn redirect(
    response_headers: &mut HeaderMap,
    request_headers: &HeaderMap,
    target: &str,
) -> Result<StatusCode, (StatusCode, String)> {
    let target = HeaderValue::from_str(target).map_err(internal_error)?;

    let is_fragment_request = request_headers
        .get(HX_REQUEST)
        .is_some_and(|value| value == "true");

    if is_fragment_request {
        response_headers.insert(HX_REDIRECT, target);

        Ok(StatusCode::NO_CONTENT)
    } else {
        response_headers.insert(LOCATION, target);

        Ok(StatusCode::FOUND)
    }
}

/// Utility function for mapping any error into a `500 Internal Server Error`
/// response.
fn internal_error<E>(err: E) -> (StatusCode, String)
where
    E: std::error::Error,
{
    tracing::error!("Resolution failed: {err}");

    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

/// Reject paths that do not decode to valid UTF-8
fn invalid_path(_err: Utf8Error) -> (StatusCode, String) {
    (
        StatusCode::BAD_REQUEST,
        "URL contains invalid UTF-8 characters".to_string(),
    )
}

/// URL decode the request path
///
/// Uses percentage encoding for the decoding, might error in case of invalid
/// UTF-8
fn url_decode_path(path: &str) -> Result<String, Utf8Error> {
    let decoded = percent_decode_str(path);

    decoded.decode_utf8().map(|decoded| decoded.to_string())
}
