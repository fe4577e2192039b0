//! Request id extraction.
//!
//! # Responsibilities
//! - Read the inbound correlation header
//! - Generate a fresh id when the header is missing or unusable
//! - Capture client headers (`X-Client`, `X-Version`) that records carry
//!   alongside the id
//!
//! # Design Decisions
//! - Inbound ids are kept verbatim (no trimming or case folding)
//! - Generation is pluggable through tower-http's `MakeRequestId`

use axum::http::{HeaderMap, HeaderName, Request};
use tower_http::request_id::{MakeRequestId, MakeRequestUuid};

use crate::context::RequestId;

/// Conventional correlation header.
pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Client headers copied onto every record of the request, when present.
pub const CLIENT_HEADERS: [&str; 2] = ["X-Client", "X-Version"];

/// Where request ids come from: an inbound header, else a generator.
#[derive(Debug, Clone)]
pub struct RequestIdPolicy<M = MakeRequestUuid> {
    header: HeaderName,
    make: M,
    attributes: Vec<&'static str>,
}

impl RequestIdPolicy {
    pub fn new() -> Self {
        Self {
            header: X_REQUEST_ID.clone(),
            make: MakeRequestUuid,
            attributes: CLIENT_HEADERS.to_vec(),
        }
    }
}

impl Default for RequestIdPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> RequestIdPolicy<M> {
    /// Reads ids from `header` instead of `x-request-id`.
    pub fn with_header(mut self, header: HeaderName) -> Self {
        self.header = header;
        self
    }

    /// Replaces the generator used when no inbound id is present.
    pub fn with_generator<G: MakeRequestId>(self, make: G) -> RequestIdPolicy<G> {
        RequestIdPolicy {
            header: self.header,
            make,
            attributes: self.attributes,
        }
    }

    /// Also copies `name` from the request onto its records.
    pub fn with_attribute_header(mut self, name: &'static str) -> Self {
        if !self.attributes.contains(&name) {
            self.attributes.push(name);
        }
        self
    }

    pub fn header(&self) -> &HeaderName {
        &self.header
    }

    /// Header names captured as record attributes.
    pub fn attribute_headers(&self) -> &[&'static str] {
        &self.attributes
    }
}

impl<M: MakeRequestId> RequestIdPolicy<M> {
    /// The inbound id if usable, else a generated one, carrying the client
    /// attribute headers the request has.
    pub fn extract<B>(&mut self, request: &Request<B>) -> RequestId {
        let id = inbound_request_id(request.headers(), &self.header).unwrap_or_else(|| {
            self.make
                .make_request_id(request)
                .and_then(|id| id.header_value().to_str().ok().map(RequestId::from))
                .unwrap_or_else(|| RequestId::from(uuid::Uuid::new_v4().to_string()))
        });

        self.attributes.iter().fold(id, |id, name| {
            match request.headers().get(*name).and_then(|v| v.to_str().ok()) {
                Some(value) if !value.is_empty() => id.with_attribute(name, value),
                _ => id,
            }
        })
    }
}

/// The id carried in `header`, if present, non-empty and visible ASCII.
pub fn inbound_request_id(headers: &HeaderMap, header: &HeaderName) -> Option<RequestId> {
    headers
        .get(header)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(RequestId::from)
}
