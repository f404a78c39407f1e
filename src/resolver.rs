//! The slug resolution engine
//!
//! Given an inbound request path and host, decide whether and where to
//! redirect. Every step below is a handful of indexed point lookups; the
//! whole chain short-circuits on its first match:
//!
//! 1. keyword routing on the first path segment
//! 2. keyword routing on the request host
//! 3. exact slug match
//! 4. longest-to-shortest prefix match with `$name` substitution
//!
//! Keyword redirects are deliberately public; slug redirects go through the
//! visibility gate first.

use percent_encoding::AsciiSet;
use percent_encoding::NON_ALPHANUMERIC;
use percent_encoding::percent_decode_str;
use percent_encoding::utf8_percent_encode;
use uuid::Uuid;

use crate::links::Link;
use crate::links::Visibility;
use crate::storage::Result;
use crate::storage::Storage;
use crate::users::User;

/// Where anonymous visitors of a secure link are sent
pub const LOGIN_PATH: &str = "/auth/login";

/// Escapes applied to substituted values; keeps the RFC 3986 unreserved set
const VALUE_ESCAPES: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// The one decision the resolver hands back to the HTTP layer
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Send the caller on their way
    Redirect {
        /// The final destination URL
        target: String,

        /// The matched link, if any; keyword redirects have none
        link_id: Option<Uuid>,
    },

    /// No keyword, slug or prefix matched (also covers arity mismatches)
    NotFound,

    /// Secure link, authenticated but not authorized
    Forbidden,

    /// Secure link, nobody authenticated
    LoginRequired {
        /// Original request path to return to after login
        return_to: String,
    },
}

/// Per-link access decision for the current caller
enum Access {
    Granted,
    Denied,
    LoginRequired,
}

/// Resolve a request path against keywords and links
///
/// `path` is the raw request path; every segment is percent-decoded on its
/// own, so an encoded slash stays inside its segment instead of splitting
/// it. `host` is the raw `Host` header value; a port is stripped before any
/// comparison. `user` is the authenticated caller, if any.
pub async fn resolve<S: Storage>(
    storage: &S,
    path: &str,
    host: &str,
    user: Option<&User>,
) -> Result<Outcome> {
    let raw_path = path.strip_prefix('/').unwrap_or(path);

    if raw_path.is_empty() {
        return Ok(Outcome::NotFound);
    }

    let segments = raw_path
        .split('/')
        .map(decode_segment)
        .collect::<Vec<String>>();
    let full_path = segments.join("/");

    let hostname = host.split(':').next().unwrap_or(host);

    // keyword in the first path segment, unless the host already is that
    // keyword (the host-based branch below would double-handle it)
    if segments.len() > 1 && segments[0] != hostname {
        let first = segments[0].as_str();

        if let Some(keyword) = storage.find_single_keyword_by_keyword(first).await? {
            tracing::debug!(r#"Keyword "{first}" matched path segment"#);

            return Ok(Outcome::Redirect {
                target: keyword.apply(&segments[1..].join("/")),
                link_id: None,
            });
        }
    }

    // keyword as hostname alias; the whole path becomes the slug value
    if let Some(keyword) = storage.find_single_keyword_by_keyword(hostname).await? {
        tracing::debug!(r#"Keyword "{hostname}" matched request host"#);

        return Ok(Outcome::Redirect {
            target: keyword.apply(&full_path),
            link_id: None,
        });
    }

    // exact slug match, no substitution
    if let Some(link) = storage.find_single_link_by_slug(&full_path).await? {
        return match authorize(storage, &link, user).await? {
            Access::Granted => Ok(Outcome::Redirect {
                target: link.url_template.clone(),
                link_id: Some(link.id),
            }),
            Access::Denied => Ok(Outcome::Forbidden),
            Access::LoginRequired => Ok(Outcome::LoginRequired {
                return_to: format!("/{full_path}"),
            }),
        };
    }

    // prefix match: drop one trailing segment at a time, feed the rest into
    // the template placeholders
    for cut in (1..segments.len()).rev() {
        let candidate = segments[..cut].join("/");

        let Some(link) = storage.find_single_link_by_slug(&candidate).await? else {
            continue;
        };

        match authorize(storage, &link, user).await? {
            Access::Granted => {}
            Access::Denied => return Ok(Outcome::Forbidden),
            Access::LoginRequired => {
                return Ok(Outcome::LoginRequired {
                    return_to: format!("/{full_path}"),
                });
            }
        }

        let placeholders = extract_placeholders(&link.url_template);
        let remaining = &segments[cut..];

        // firm arity contract: no partial substitution, no shorter prefixes
        if remaining.len() != placeholders.len() {
            tracing::debug!(
                r#"Slug "{candidate}" expects {} values, got {}"#,
                placeholders.len(),
                remaining.len()
            );

            return Ok(Outcome::NotFound);
        }

        let values = placeholders
            .into_iter()
            .zip(remaining.iter().map(|segment| escape_value(segment)))
            .collect::<Vec<(String, String)>>();

        return Ok(Outcome::Redirect {
            target: expand_template(&link.url_template, &values),
            link_id: Some(link.id),
        });
    }

    tracing::debug!(r#"Path "{full_path}" did not match any keyword or slug"#);

    Ok(Outcome::NotFound)
}

/// Evaluate a link's visibility against the current caller
///
/// Public and private links redirect for everybody; private is unlisted,
/// not access-controlled. Secure links consult role, ownership and share
/// grants, in that order.
async fn authorize<S: Storage>(storage: &S, link: &Link, user: Option<&User>) -> Result<Access> {
    match link.visibility {
        Visibility::Public | Visibility::Private => Ok(Access::Granted),
        Visibility::Secure => {
            let Some(user) = user else {
                return Ok(Access::LoginRequired);
            };

            if user.is_admin()
                || storage.is_owner(&link.id, &user.id).await?
                || storage.has_share(&link.id, &user.id).await?
            {
                Ok(Access::Granted)
            } else {
                Ok(Access::Denied)
            }
        }
    }
}

/// The distinct `$name` placeholders of a template, in order of first
/// appearance
///
/// A name starts with `[a-z]` and continues with `[a-z0-9_]`; anything else
/// after a `$` is literal text. The same name may appear more than once and
/// still counts as one placeholder.
pub fn extract_placeholders(template: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let mut rest = template;

    while let Some(position) = rest.find('$') {
        let after = &rest[position + 1..];

        match parse_placeholder_name(after) {
            Some(name) => {
                if !names.iter().any(|known| known == name) {
                    names.push(name.to_string());
                }
                rest = &after[name.len()..];
            }
            None => rest = after,
        }
    }

    names
}

/// Replace every `$name` occurrence with its value
///
/// Names are maximal runs of placeholder characters, so `$query` can never
/// be clipped by a shorter `$q`.
fn expand_template(template: &str, values: &[(String, String)]) -> String {
    let mut expanded = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(position) = rest.find('$') {
        expanded.push_str(&rest[..position]);

        let after = &rest[position + 1..];

        match parse_placeholder_name(after) {
            Some(name) => {
                match values.iter().find(|(known, _)| known == name) {
                    Some((_, value)) => expanded.push_str(value),
                    None => {
                        expanded.push('$');
                        expanded.push_str(name);
                    }
                }
                rest = &after[name.len()..];
            }
            None => {
                expanded.push('$');
                rest = after;
            }
        }
    }

    expanded.push_str(rest);
    expanded
}

/// The placeholder name at the start of `input`, if any
fn parse_placeholder_name(input: &str) -> Option<&str> {
    let mut end = 0;

    for (index, ch) in input.char_indices() {
        let valid = if index == 0 {
            ch.is_ascii_lowercase()
        } else {
            ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_'
        };

        if !valid {
            break;
        }

        end = index + ch.len_utf8();
    }

    (end > 0).then(|| &input[..end])
}

/// Percent-decode a single path segment
///
/// The HTTP layer has already rejected paths that do not decode to valid
/// UTF-8, so the lossy fallback never fires for real requests.
fn decode_segment(segment: &str) -> String {
    percent_decode_str(segment).decode_utf8_lossy().to_string()
}

/// Escape a path segment for embedding into a URL template
fn escape_value(segment: &str) -> String {
    utf8_percent_encode(segment, VALUE_ESCAPES).to_string()
}
