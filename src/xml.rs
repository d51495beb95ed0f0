//! XML response reader
//!
//! Every server response is a small XML document whose root element carries
//! `status_code`/`status_message` attributes and whose child elements carry
//! the result fields.

use roxmltree::Document;

use crate::error::{GsError, Result};
use crate::server::AppEntry;

fn parse(body: &[u8]) -> Result<String> {
    String::from_utf8(body.to_vec()).map_err(|_| GsError::InvalidResponse {
        message: "response body is not valid UTF-8".into(),
    })
}

/// Check the root `status_code` attribute
///
/// Ok iff `status_code == "200"`. Otherwise the server's
/// `status_message` (or the raw code) is surfaced via [`GsError::Server`].
///
/// # Errors
///
/// Returns [`GsError::InvalidResponse`] if the body does not parse or the
/// attribute is missing, [`GsError::Server`] on a non-200 code.
pub fn status(body: &[u8]) -> Result<()> {
    let text = parse(body)?;
    let doc = Document::parse(&text)?;
    let root = doc.root_element();

    let code = root
        .attribute("status_code")
        .ok_or_else(|| GsError::InvalidResponse {
            message: "missing status_code attribute".into(),
        })?;

    if code == "200" {
        return Ok(());
    }

    let message = root
        .attribute("status_message")
        .map_or_else(|| format!("status code {code}"), ToOwned::to_owned);
    Err(GsError::Server { message })
}

/// Text content of the first element named `name`
///
/// A present-but-empty element yields an empty string; only a missing
/// element is an error, matching the wire contract where emptiness is
/// checked separately by the caller.
///
/// # Errors
///
/// Returns [`GsError::MissingElement`] if no such element exists.
pub fn search(body: &[u8], name: &str) -> Result<String> {
    let text = parse(body)?;
    let doc = Document::parse(&text)?;
    doc.descendants()
        .find(|n| n.is_element() && n.has_tag_name(name))
        .map(|n| n.text().unwrap_or_default().to_owned())
        .ok_or_else(|| GsError::missing(name))
}

/// Text content of the first element named `name`, or `None` when absent
///
/// For elements only some host implementations emit (GFE and Sunshine
/// each send fields the other omits).
///
/// # Errors
///
/// Returns [`GsError::InvalidResponse`] if the body does not parse.
pub fn search_opt(body: &[u8], name: &str) -> Result<Option<String>> {
    let text = parse(body)?;
    let doc = Document::parse(&text)?;
    Ok(doc
        .descendants()
        .find(|n| n.is_element() && n.has_tag_name(name))
        .map(|n| n.text().unwrap_or_default().to_owned()))
}

/// Parse an `<Applist>` document into app entries
///
/// # Errors
///
/// Returns [`GsError::InvalidResponse`] if the body does not parse or an
/// entry lacks its id or title.
pub fn applist(body: &[u8]) -> Result<Vec<AppEntry>> {
    let text = parse(body)?;
    let doc = Document::parse(&text)?;

    let mut apps = Vec::new();
    for app in doc
        .descendants()
        .filter(|n| n.is_element() && n.has_tag_name("App"))
    {
        let field = |name: &str| {
            app.children()
                .find(|n| n.is_element() && n.has_tag_name(name))
                .and_then(|n| n.text())
        };

        let id = field("ID")
            .and_then(|t| t.trim().parse::<i32>().ok())
            .ok_or_else(|| GsError::InvalidResponse {
                message: "app entry without a numeric <ID>".into(),
            })?;
        let title = field("AppTitle")
            .ok_or_else(|| GsError::InvalidResponse {
                message: "app entry without an <AppTitle>".into(),
            })?
            .to_owned();
        let hdr_supported = field("IsHdrSupported").is_some_and(|t| t.trim() == "1");

        apps.push(AppEntry {
            id,
            title,
            hdr_supported,
        });
    }

    Ok(apps)
}
