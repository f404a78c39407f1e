//! API request helpers
//!
//! Extractor wrappers with friendlier rejections, plus the validation for
//! the user-supplied identifiers: slugs, keywords and URL templates.

use axum::extract::FromRequest;
use axum::extract::FromRequestParts;
use axum::extract::Json;
use axum::extract::Path;
use axum::extract::Request;
use axum::extract::rejection::JsonRejection;
use axum::extract::rejection::PathRejection;
use axum::http::request::Parts;
use serde::de::DeserializeOwned;
use url::Url;

use crate::keywords::SLUG_MARKER;
use crate::links::RESERVED_SLUGS;

use super::Error;

/// Parse and normalize a slug
///
/// Leading and trailing slashes are stripped. Every `/`-separated segment
/// must be lowercase alphanumeric with inner dashes; the first segment must
/// not collide with an application route.
pub fn parse_slug(slug: &str) -> Result<String, Error> {
    let slug = slug.trim_matches('/');

    if slug.is_empty() {
        return Err(Error::bad_request("Slug can not be empty"));
    }

    for (index, segment) in slug.split('/').enumerate() {
        if !is_valid_slug_segment(segment) {
            return Err(Error::bad_request(format!(
                r#"Invalid slug segment "{segment}""#
            )));
        }

        if index == 0 && RESERVED_SLUGS.contains(&segment) {
            return Err(Error::bad_request(format!(
                r#"Slug "{segment}" is reserved"#
            )));
        }
    }

    Ok(slug.to_string())
}

/// A slug segment: `[a-z0-9]([a-z0-9-]*[a-z0-9])?`
fn is_valid_slug_segment(segment: &str) -> bool {
    !segment.is_empty()
        && !segment.starts_with('-')
        && !segment.ends_with('-')
        && segment
            .chars()
            .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-')
}

/// Parse and validate a link URL template
///
/// The template must be a parseable URL; `$name` placeholders are left
/// untouched. The raw string is returned since [`Url`] would re-encode the
/// placeholder syntax.
pub fn parse_url_template(url_template: &str) -> Result<String, Error> {
    Url::parse(url_template).map_err(Error::bad_request)?;

    Ok(url_template.to_string())
}

/// Parse and validate a keyword: `[a-z][a-z0-9-]*`
pub fn parse_keyword(keyword: &str) -> Result<String, Error> {
    let mut chars = keyword.chars();

    let valid = match chars.next() {
        Some(first) => {
            first.is_ascii_lowercase()
                && chars.all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-')
        }
        None => false,
    };

    if valid {
        Ok(keyword.to_string())
    } else {
        Err(Error::bad_request(format!(r#"Invalid keyword "{keyword}""#)))
    }
}

/// Parse and validate a keyword URL template
///
/// Must be a parseable URL containing the literal `{slug}` marker.
pub fn parse_keyword_template(url_template: &str) -> Result<String, Error> {
    if !url_template.contains(SLUG_MARKER) {
        return Err(Error::bad_request(format!(
            "Keyword template must contain {SLUG_MARKER}"
        )));
    }

    Url::parse(url_template).map_err(Error::bad_request)?;

    Ok(url_template.to_string())
}

fn parse_json<J>(json: Result<Json<J>, JsonRejection>) -> Result<J, Error> {
    match json {
        Ok(Json(json)) => Ok(json),
        Err(err) => match err {
            JsonRejection::JsonDataError(err) => {
                Err(Error::bad_request("Data error").with_description(err))
            }
            JsonRejection::JsonSyntaxError(err) => Err(Error::bad_request("JSON syntax error")
                .with_description(std::error::Error::source(&err).expect("A valid source"))),
            JsonRejection::MissingJsonContentType(_err) => Err(Error::bad_request(
                "Missing `application/json` content type",
            )),
            JsonRejection::BytesRejection(err) => {
                Err(Error::bad_request("Invalid characters in JSON").with_description(err))
            }
            err => Err(Error::bad_request("Unknown JSON error").with_description(err)),
        },
    }
}

/// Wrapper for the JSON extractor
pub struct Form<F>(pub F);

impl<S, F> FromRequest<S> for Form<F>
where
    S: Send + Sync,
    F: DeserializeOwned,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let json = Json::<F>::from_request(req, state).await;

        parse_json(json).map(Form)
    }
}

fn parse_path<P>(path: Result<Path<P>, PathRejection>) -> Result<P, Error> {
    match path {
        Ok(Path(path)) => Ok(path),
        Err(err) => match err {
            PathRejection::FailedToDeserializePathParams(err) => {
                Err(Error::bad_request("Invalid path parameter").with_description(err))
            }
            PathRejection::MissingPathParams(err) => {
                Err(Error::bad_request("Missing path parameter").with_description(err))
            }
            err => Err(Error::bad_request("Unknown path error").with_description(err)),
        },
    }
}

pub struct PathParameters<P>(pub P);

impl<S, P> FromRequestParts<S> for PathParameters<P>
where
    S: Send + Sync,
    P: DeserializeOwned + Send,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let path = Path::<P>::from_request_parts(parts, state).await;

        parse_path(path).map(PathParameters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_slug() {
        assert_eq!(parse_slug("/some-slug").unwrap(), "some-slug".to_string());
        assert_eq!(parse_slug("some-slug/").unwrap(), "some-slug".to_string());
        assert_eq!(parse_slug("some-slug").unwrap(), "some-slug".to_string());
    }

    #[test]
    fn test_parse_slug_with_segments() {
        assert_eq!(
            parse_slug("github/joestump").unwrap(),
            "github/joestump".to_string()
        );
    }

    #[test]
    fn test_parse_slug_rejects_bad_segments() {
        assert!(parse_slug("").is_err());
        assert!(parse_slug("Upper").is_err());
        assert!(parse_slug("-dash").is_err());
        assert!(parse_slug("dash-").is_err());
        assert!(parse_slug("a//b").is_err());
        assert!(parse_slug("with space").is_err());
    }

    #[test]
    fn test_parse_slug_rejects_reserved_names() {
        for reserved in RESERVED_SLUGS {
            assert!(parse_slug(reserved).is_err());
        }

        // only the first segment is checked against the reserved list
        assert!(parse_slug("docs/api").is_ok());
    }

    #[test]
    fn test_parse_url_template() {
        assert!(parse_url_template("https://www.example.com/").is_ok());
        assert!(parse_url_template("not a url").is_err());
    }

    #[test]
    fn test_parse_url_template_keeps_placeholders_raw() {
        assert_eq!(
            parse_url_template("https://github.com/$username").unwrap(),
            "https://github.com/$username"
        );
    }

    #[test]
    fn test_parse_url_template_accepts_repeated_placeholder() {
        // one declared variable used twice is valid, both get substituted
        assert!(parse_url_template("https://example.com/$name/pins/$name").is_ok());
    }

    #[test]
    fn test_parse_keyword() {
        assert!(parse_keyword("wtf").is_ok());
        assert!(parse_keyword("jira-prod").is_ok());
        assert!(parse_keyword("").is_err());
        assert!(parse_keyword("9lives").is_err());
        assert!(parse_keyword("WTF").is_err());
    }

    #[test]
    fn test_parse_keyword_template() {
        assert!(parse_keyword_template("https://example.com/?q={slug}").is_ok());
        assert!(parse_keyword_template("https://example.com/?q=").is_err());
    }
}
