//! All API endpoint setup

use axum::Router;
use axum::routing::delete;
use axum::routing::get;
use axum::routing::patch;
use axum::routing::post;
use axum::routing::put;

pub use current_user::CurrentUser;
pub use current_user::JwtKeys;
pub use request::Form;
pub use request::PathParameters;
pub use request::parse_keyword;
pub use request::parse_keyword_template;
pub use request::parse_slug;
pub use request::parse_url_template;
pub use response::Error;
pub use response::Success;

use crate::storage::Storage;

mod current_user;
mod keywords;
mod links;
mod request;
mod response;
mod users;

/// Get the Axum router for all API routes
pub fn router<S: Storage>() -> Router {
    let users = Router::new()
        .route("/token", post(users::token::<S>))
        .route("/", post(users::create::<S>))
        .route("/me", get(users::me::<S>));

    let links = Router::new()
        .route("/", get(links::list::<S>))
        .route("/", post(links::create::<S>))
        .route("/{link}", get(links::single::<S>))
        .route("/{link}", patch(links::update::<S>))
        .route("/{link}", delete(links::delete::<S>))
        .route("/{link}/owners", get(links::list_owners::<S>))
        .route("/{link}/owners", post(links::add_owner::<S>))
        .route("/{link}/owners/{user}", delete(links::remove_owner::<S>))
        .route("/{link}/shares", get(links::list_shares::<S>))
        .route("/{link}/shares", post(links::add_share::<S>))
        .route("/{link}/shares/{user}", delete(links::remove_share::<S>))
        .route("/{link}/tags", get(links::list_tags::<S>))
        .route("/{link}/tags", put(links::set_tags::<S>));

    let keywords = Router::new()
        .route("/", get(keywords::list::<S>))
        .route("/", post(keywords::create::<S>))
        .route("/{keyword}", delete(keywords::delete::<S>));

    Router::new()
        .nest("/users", users)
        .nest("/links", links)
        .nest("/keywords", keywords)
}
