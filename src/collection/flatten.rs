//! Turns the folder tree of a collection into a flat, ordered request list.

use super::schema::{
    AuthBlock, BodySpec, Collection, Item, QueryParam, RequestDef, RequestSpec, Segments, UrlDetail,
    UrlSpec,
};
use crate::auth::AuthSpec;
use crate::expect::Expectation;
use crate::models::request::{HttpMethod, HttpRequest};
use crate::variables::parse_capture_directives;
use log::warn;
use url::form_urlencoded;

/// Walks the tree depth-first in document order.
pub(crate) fn flatten(collection: &Collection) -> Vec<HttpRequest> {
    let mut requests = Vec::new();
    let root_auth = resolve_auth(collection.auth.as_ref(), AuthSpec::None);
    let mut folder = Vec::new();
    walk(&collection.item, &mut folder, &root_auth, &mut requests);
    requests
}

fn walk(items: &[Item], folder: &mut Vec<String>, auth: &AuthSpec, out: &mut Vec<HttpRequest>) {
    for item in items {
        if let Some(children) = &item.item {
            let folder_auth = resolve_auth(item.auth.as_ref(), auth.clone());
            folder.push(item.name.clone());
            walk(children, folder, &folder_auth, out);
            folder.pop();
        } else if let Some(request) = &item.request {
            let id = out.len().to_string();
            out.push(build_request(id, item, request, folder, auth));
        } else {
            warn!("skipping item '{}': neither a folder nor a request", item.name);
        }
    }
}

/// An auth block replaces the inherited auth; `noauth` resets it.
fn resolve_auth(block: Option<&AuthBlock>, inherited: AuthSpec) -> AuthSpec {
    match block {
        Some(block) => AuthSpec::from_block(block),
        None => inherited,
    }
}

fn build_request(
    id: String,
    item: &Item,
    request: &RequestDef,
    folder: &[String],
    inherited_auth: &AuthSpec,
) -> HttpRequest {
    let default_spec = RequestSpec::default();
    let (spec, raw_url) = match request {
        RequestDef::Url(url) => (&default_spec, url.clone()),
        RequestDef::Full(spec) => (spec, spec.url.as_ref().map(build_url).unwrap_or_default()),
    };

    let method = match spec.method.as_deref() {
        None => HttpMethod::GET,
        Some(method) => HttpMethod::parse(method).unwrap_or_else(|| {
            warn!("'{}': unknown method '{}', using GET", item.name, method);
            HttpMethod::GET
        }),
    };

    let mut req = HttpRequest::new(id, method, raw_url);
    req.name = if item.name.is_empty() {
        format!("Request {}", req.id)
    } else {
        item.name.clone()
    };
    req.folder = folder.to_vec();

    for header in spec.header.iter().filter(|h| !h.disabled && !h.key.is_empty()) {
        req.add_header(header.key.clone(), header.value.clone());
    }

    if let Some(body) = &spec.body {
        apply_body(&mut req, body);
    }

    req.auth = resolve_auth(spec.auth.as_ref(), inherited_auth.clone());

    let description = [
        item.description.as_ref().map(|d| d.as_text()),
        spec.description.as_ref().map(|d| d.as_text()),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join("\n");

    req.captures = parse_capture_directives(&description);
    let example = item.response.first();
    req.expectation = Expectation::from_sources(
        &description,
        example.and_then(|e| e.code),
        example.and_then(|e| e.body.as_deref()),
    );

    req
}

/// The raw form wins; otherwise the URL is assembled from its parts.
pub(crate) fn build_url(url: &UrlSpec) -> String {
    match url {
        UrlSpec::Raw(raw) => raw.clone(),
        UrlSpec::Detailed(detail) => match detail.raw.as_deref() {
            Some(raw) if !raw.trim().is_empty() => strip_disabled_query(raw, &detail.query),
            _ => assemble_url(detail),
        },
    }
}

fn assemble_url(detail: &UrlDetail) -> String {
    let mut url = String::new();
    if let Some(protocol) = detail.protocol.as_deref().filter(|p| !p.is_empty()) {
        url.push_str(protocol);
        url.push_str("://");
    }
    match &detail.host {
        Some(Segments::Joined(host)) => url.push_str(host),
        Some(Segments::List(parts)) => {
            let parts: Vec<&str> = parts.iter().map(|s| s.as_str()).collect();
            url.push_str(&parts.join("."));
        }
        None => {}
    }
    if let Some(port) = detail.port.as_ref().and_then(super::schema::value_to_string) {
        if !port.is_empty() {
            url.push(':');
            url.push_str(&port);
        }
    }
    match &detail.path {
        Some(Segments::Joined(path)) => {
            if !path.starts_with('/') {
                url.push('/');
            }
            url.push_str(path);
        }
        Some(Segments::List(parts)) => {
            for part in parts {
                url.push('/');
                url.push_str(part.as_str());
            }
        }
        None => {}
    }

    let query: Vec<String> = detail
        .query
        .iter()
        .filter(|q| !q.disabled)
        .filter_map(query_pair)
        .collect();
    if !query.is_empty() {
        url.push('?');
        url.push_str(&query.join("&"));
    }
    url
}

fn query_pair(param: &QueryParam) -> Option<String> {
    let key = param.key.as_deref()?;
    Some(match param.value.as_deref() {
        Some(value) => format!("{}={}", key, value),
        None => key.to_string(),
    })
}

/// Postman keeps disabled params in `query` but they may still appear in `raw`.
fn strip_disabled_query(raw: &str, query: &[QueryParam]) -> String {
    let disabled: Vec<String> = query
        .iter()
        .filter(|q| q.disabled)
        .filter_map(query_pair)
        .collect();
    if disabled.is_empty() {
        return raw.to_string();
    }
    let Some((base, rest)) = raw.split_once('?') else {
        return raw.to_string();
    };
    let (query_string, fragment) = match rest.split_once('#') {
        Some((q, f)) => (q, Some(f)),
        None => (rest, None),
    };

    let kept: Vec<&str> = query_string
        .split('&')
        .filter(|pair| !pair.is_empty() && !disabled.iter().any(|d| d == pair))
        .collect();

    let mut url = base.to_string();
    if !kept.is_empty() {
        url.push('?');
        url.push_str(&kept.join("&"));
    }
    if let Some(fragment) = fragment {
        url.push('#');
        url.push_str(fragment);
    }
    url
}

fn apply_body(req: &mut HttpRequest, body: &BodySpec) {
    match body.mode.as_deref() {
        Some("raw") | None => {
            let Some(raw) = body.raw.as_deref().filter(|r| !r.is_empty()) else {
                return;
            };
            req.set_body(raw);
            if body.raw_language() == Some("json") && !req.has_header("Content-Type") {
                req.add_header("Content-Type", "application/json");
            }
        }
        Some("urlencoded") => {
            apply_form(req, &body.urlencoded);
        }
        Some("formdata") => {
            for param in body
                .formdata
                .iter()
                .filter(|p| !p.disabled && p.param_type.as_deref() == Some("file"))
            {
                warn!("'{}': skipping file field '{}'", req.name, param.key);
            }
            let text_fields: Vec<_> = body
                .formdata
                .iter()
                .filter(|p| p.param_type.as_deref() != Some("file"))
                .cloned()
                .collect();
            apply_form(req, &text_fields);
        }
        Some(other) => {
            warn!("'{}': body mode '{}' is not supported, sending no body", req.name, other);
        }
    }
}

fn apply_form(req: &mut HttpRequest, params: &[super::schema::FormParam]) {
    let pairs: Vec<String> = params
        .iter()
        .filter(|p| !p.disabled)
        .map(|p| {
            format!(
                "{}={}",
                encode_preserving_placeholders(&p.key),
                encode_preserving_placeholders(p.value.as_deref().unwrap_or(""))
            )
        })
        .collect();
    if pairs.is_empty() {
        return;
    }
    req.set_body(pairs.join("&"));
    if !req.has_header("Content-Type") {
        req.add_header("Content-Type", "application/x-www-form-urlencoded");
    }
}

/// Percent-encodes form text while leaving `{{placeholders}}` intact so they
/// can still be substituted.
pub(crate) fn encode_preserving_placeholders(text: &str) -> String {
    let mut out = String::new();
    let mut rest = text;
    while let Some(start) = rest.find("{{") {
        let Some(len) = rest[start..].find("}}") else {
            break;
        };
        out.extend(form_urlencoded::byte_serialize(rest[..start].as_bytes()));
        out.push_str(&rest[start..start + len + 2]);
        rest = &rest[start + len + 2..];
    }
    out.extend(form_urlencoded::byte_serialize(rest.as_bytes()));
    out
}
