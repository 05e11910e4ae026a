use utoipa::openapi::{Contact, License, OpenApi as OpenApiDoc, Tag};
use utoipa::OpenApi;

use super::handlers::{self, health, pages, session, user};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        session::session,
        user::get_user,
        user::update_user,
        pages::home,
        pages::dashboard,
        pages::admin,
    ),
    components(schemas(
        health::Health,
        handlers::ErrorBody,
        handlers::SessionView,
        user::Profile,
        user::ProfileUpdated,
        pages::Page,
    ))
)]
struct ApiDoc;

/// `OpenAPI` document with the info block taken from Cargo metadata.
#[must_use]
pub fn openapi() -> OpenApiDoc {
    let mut doc = ApiDoc::openapi();
    doc.info.title = env!("CARGO_PKG_NAME").to_string();
    doc.info.version = env!("CARGO_PKG_VERSION").to_string();
    doc.info.description = optional_str(env!("CARGO_PKG_DESCRIPTION")).map(str::to_string);
    doc.info.contact = cargo_contact();
    doc.info.license = optional_str(env!("CARGO_PKG_LICENSE")).map(|identifier| {
        let mut license = License::new(identifier);
        license.identifier = Some(identifier.to_string());
        license
    });

    let mut auth = Tag::new("auth");
    auth.description = Some("Server-resolved session".to_string());
    let mut pages = Tag::new("pages");
    pages.description = Some("Protected entry points".to_string());
    doc.tags = Some(vec![Tag::new("health"), auth, Tag::new("user"), pages]);

    doc
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let primary = env!("CARGO_PKG_AUTHORS").split(';').next().map(str::trim)?;
    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }
    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    fn non_empty(value: &str) -> Option<&str> {
        let value = value.trim();
        (!value.is_empty()).then_some(value)
    }
    match author.find('<') {
        Some(start) => (
            non_empty(&author[..start]),
            non_empty(author[start + 1..].trim_end_matches('>')),
        ),
        None => (non_empty(author), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_comes_from_cargo() {
        let doc = openapi();
        assert_eq!(doc.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(doc.info.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(
            doc.info.license.map(|license| license.name),
            Some("BSD-3-Clause".to_string())
        );
    }

    #[test]
    fn documents_every_route() {
        let doc = openapi();
        for path in ["/health", "/api/auth/session", "/api/protected/user", "/", "/dashboard", "/admin"] {
            assert!(doc.paths.paths.contains_key(path), "{path}");
        }
    }

    #[test]
    fn author_parsing() {
        assert_eq!(
            parse_author("Team <team@tpauth.dev>"),
            (Some("Team"), Some("team@tpauth.dev"))
        );
        assert_eq!(parse_author("Team"), (Some("Team"), None));
        assert_eq!(parse_author("<a@b.c>"), (None, Some("a@b.c")));
    }
}
