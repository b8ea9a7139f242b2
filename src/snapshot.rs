//! Immutable request/response snapshots and the runtime-fact records they
//! are captured from.
//!
//! Snapshots are built once from externally supplied facts (never from
//! ambient globals), apply their normalization rules at construction time,
//! and afterwards only answer projections.

use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::fields::{Field, Side};
use crate::format::format_timestamp;

/// Raw facts about an in-flight request, as supplied by the hosting
/// runtime adapter. Read-only snapshot source.
#[derive(Debug, Clone)]
pub struct RequestFacts {
    pub method: String,
    /// Full request target including the query string.
    pub url: String,
    /// Base path prefix the application is mounted under.
    pub base: String,
    /// HTTP protocol version string, e.g. `HTTP/1.1`.
    pub version: String,
    pub peer_ip: Option<String>,
    pub peer_port: Option<u16>,
    /// All request headers, in wire order.
    pub headers: Vec<(String, String)>,
    /// Parsed query-string parameters.
    pub query: Value,
    /// Parsed form parameters.
    pub form: Value,
    /// Raw request body, if the adapter captured one.
    pub body: Option<String>,
    pub cookies: Value,
    pub files: Value,
    pub timestamp: OffsetDateTime,
    pub is_secure: bool,
    pub is_ajax: bool,
}

impl Default for RequestFacts {
    fn default() -> Self {
        RequestFacts {
            method: "GET".to_string(),
            url: "/".to_string(),
            base: "/".to_string(),
            version: "HTTP/1.1".to_string(),
            peer_ip: None,
            peer_port: None,
            headers: Vec::new(),
            query: Value::Object(Map::new()),
            form: Value::Object(Map::new()),
            body: None,
            cookies: Value::Object(Map::new()),
            files: Value::Object(Map::new()),
            timestamp: OffsetDateTime::now_utc(),
            is_secure: false,
            is_ajax: false,
        }
    }
}

/// Raw facts about a finalized response. Must only be built once the
/// wrapped handler has finished producing output.
#[derive(Debug, Clone)]
pub struct ResponseFacts {
    pub status_code: u16,
    pub body: String,
    pub headers: Vec<(String, String)>,
}

fn headers_value(headers: &[(String, String)]) -> Value {
    let mut map = Map::new();
    for (name, value) in headers {
        map.insert(name.clone(), Value::String(value.clone()));
    }
    Value::Object(map)
}

fn header_lookup<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Every request-side field value, captured once per request and immutable
/// afterwards.
#[derive(Debug, Clone)]
pub struct RequestSnapshot {
    date: Value,
    base: Value,
    url: Value,
    referrer: Value,
    method: Value,
    ip: Value,
    port: Value,
    scheme: Value,
    user_agent: Value,
    content_type: Value,
    content_length: Value,
    accept: Value,
    query: Value,
    data: Value,
    cookies: Value,
    files: Value,
    is_https: Value,
    is_ajax: Value,
    request_headers: Value,
}

impl RequestSnapshot {
    /// Capture a snapshot from runtime facts, applying URL normalization
    /// and the JSON body re-parse rule.
    pub fn capture(facts: &RequestFacts) -> RequestSnapshot {
        let header = |name: &str| {
            Value::String(header_lookup(&facts.headers, name).unwrap_or_default().to_string())
        };

        let content_type = header_lookup(&facts.headers, "content-type").unwrap_or_default();
        let content_length: u64 = header_lookup(&facts.headers, "content-length")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        RequestSnapshot {
            date: Value::String(format_timestamp(facts.timestamp)),
            base: Value::String(facts.base.clone()),
            url: Value::String(normalize_url(&facts.url, &facts.base)),
            referrer: header("referer"),
            method: Value::String(facts.method.to_uppercase()),
            ip: Value::String(facts.peer_ip.clone().unwrap_or_default()),
            port: facts
                .peer_port
                .map(Value::from)
                .unwrap_or_else(|| Value::String(String::new())),
            scheme: Value::String(facts.version.clone()),
            user_agent: header("user-agent"),
            content_type: Value::String(content_type.to_string()),
            content_length: Value::from(content_length),
            accept: header("accept"),
            query: facts.query.clone(),
            data: request_data(content_type, facts.body.as_deref(), &facts.form),
            cookies: facts.cookies.clone(),
            files: facts.files.clone(),
            is_https: Value::from(facts.is_secure as u8),
            is_ajax: Value::from(facts.is_ajax as u8),
            request_headers: headers_value(&facts.headers),
        }
    }

    /// Project the snapshot onto the given field sequence, preserving the
    /// caller's order. Response-side names are silently absent; validation
    /// happened at filter resolution.
    pub fn project(&self, fields: &[Field]) -> Vec<(&'static str, Value)> {
        fields
            .iter()
            .filter(|f| f.side() == Side::Request)
            .map(|f| (f.name(), self.value(*f)))
            .collect()
    }

    fn value(&self, field: Field) -> Value {
        match field {
            Field::Date => self.date.clone(),
            Field::Base => self.base.clone(),
            Field::Url => self.url.clone(),
            Field::Referrer => self.referrer.clone(),
            Field::Method => self.method.clone(),
            Field::Ip => self.ip.clone(),
            Field::Port => self.port.clone(),
            Field::Scheme => self.scheme.clone(),
            Field::UserAgent => self.user_agent.clone(),
            Field::ContentType => self.content_type.clone(),
            Field::ContentLength => self.content_length.clone(),
            Field::Accept => self.accept.clone(),
            Field::Query => self.query.clone(),
            Field::Data => self.data.clone(),
            Field::Cookies => self.cookies.clone(),
            Field::Files => self.files.clone(),
            Field::IsHttps => self.is_https.clone(),
            Field::IsAjax => self.is_ajax.clone(),
            Field::RequestHeaders => self.request_headers.clone(),
            _ => Value::Null,
        }
    }
}

/// Strip the base prefix from the raw URL; an emptied URL becomes `/`.
/// Applied once at capture, independent of filter selection.
fn normalize_url(url: &str, base: &str) -> String {
    let url = if base != "/" && !base.is_empty() && url.starts_with(base) {
        &url[base.len()..]
    } else {
        url
    };
    if url.is_empty() {
        "/".to_string()
    } else {
        url.to_string()
    }
}

/// JSON body re-parse rule: for application/json requests with a body that
/// parses, the parsed structure replaces the form data. Parse failure is a
/// deliberate lenient fallback, not an error.
fn request_data(content_type: &str, body: Option<&str>, form: &Value) -> Value {
    if content_type.starts_with("application/json") {
        if let Some(body) = body {
            if !body.is_empty() {
                if let Ok(parsed) = serde_json::from_str::<Value>(body) {
                    return parsed;
                }
            }
        }
    }
    form.clone()
}

/// Every response-side field value, captured once after the response body
/// has fully streamed.
#[derive(Debug, Clone)]
pub struct ResponseSnapshot {
    status_code: Value,
    body: Value,
    response_headers: Value,
}

impl ResponseSnapshot {
    pub fn capture(facts: &ResponseFacts) -> ResponseSnapshot {
        ResponseSnapshot {
            status_code: Value::from(facts.status_code),
            body: response_body(&facts.body),
            response_headers: headers_value(&facts.headers),
        }
    }

    /// Project the snapshot onto the given field sequence, preserving the
    /// caller's order. Request-side names are silently absent.
    pub fn project(&self, fields: &[Field]) -> Vec<(&'static str, Value)> {
        fields
            .iter()
            .filter(|f| f.side() == Side::Response)
            .map(|f| {
                let value = match f {
                    Field::StatusCode => self.status_code.clone(),
                    Field::Body => self.body.clone(),
                    Field::ResponseHeaders => self.response_headers.clone(),
                    _ => Value::Null,
                };
                (f.name(), value)
            })
            .collect()
    }
}

/// A response body that parses as JSON is kept structured; anything else is
/// logged verbatim with newlines flattened to spaces.
fn response_body(body: &str) -> Value {
    if let Ok(parsed) = serde_json::from_str::<Value>(body) {
        return parsed;
    }
    Value::String(body.replace('\n', " "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_url_normalization() {
        assert_eq!(normalize_url("/app/items?x=1", "/app"), "/items?x=1");
        assert_eq!(normalize_url("/app", "/app"), "/");
        assert_eq!(normalize_url("/items", "/app"), "/items");
        assert_eq!(normalize_url("/items", "/"), "/items");
        assert_eq!(normalize_url("/items", ""), "/items");
        assert_eq!(normalize_url("", "/"), "/");
    }

    #[test]
    fn test_json_body_overwrites_data() {
        let facts = RequestFacts {
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: Some(r#"{"name":"ada"}"#.to_string()),
            form: json!({"fallback": true}),
            ..RequestFacts::default()
        };
        let snapshot = RequestSnapshot::capture(&facts);
        let projected = snapshot.project(&[Field::Data]);
        assert_eq!(projected, vec![("data", json!({"name": "ada"}))]);
    }

    #[test]
    fn test_malformed_json_body_keeps_form() {
        let facts = RequestFacts {
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: Some("{not json".to_string()),
            form: json!({"fallback": true}),
            ..RequestFacts::default()
        };
        let snapshot = RequestSnapshot::capture(&facts);
        let projected = snapshot.project(&[Field::Data]);
        assert_eq!(projected, vec![("data", json!({"fallback": true}))]);
    }

    #[test]
    fn test_non_json_content_type_keeps_form() {
        let facts = RequestFacts {
            body: Some(r#"{"name":"ada"}"#.to_string()),
            form: json!({"a": "1"}),
            ..RequestFacts::default()
        };
        let snapshot = RequestSnapshot::capture(&facts);
        let projected = snapshot.project(&[Field::Data]);
        assert_eq!(projected, vec![("data", json!({"a": "1"}))]);
    }

    #[test]
    fn test_derived_header_fields() {
        let facts = RequestFacts {
            headers: vec![
                ("User-Agent".to_string(), "test-agent".to_string()),
                ("Referer".to_string(), "https://example.com".to_string()),
                ("Accept".to_string(), "application/json".to_string()),
                ("Content-Length".to_string(), "42".to_string()),
            ],
            peer_ip: Some("192.168.0.1".to_string()),
            peer_port: Some(54321),
            is_secure: true,
            ..RequestFacts::default()
        };
        let snapshot = RequestSnapshot::capture(&facts);
        let projected = snapshot.project(&[
            Field::UserAgent,
            Field::Referrer,
            Field::Accept,
            Field::ContentLength,
            Field::Ip,
            Field::Port,
            Field::IsHttps,
        ]);
        assert_eq!(
            projected,
            vec![
                ("user_agent", json!("test-agent")),
                ("referrer", json!("https://example.com")),
                ("accept", json!("application/json")),
                ("content_length", json!(42)),
                ("ip", json!("192.168.0.1")),
                ("port", json!(54321)),
                ("is_https", json!(1)),
            ]
        );
    }

    #[test]
    fn test_projection_is_idempotent_and_ordered() {
        let snapshot = RequestSnapshot::capture(&RequestFacts::default());
        let fields = [Field::Method, Field::Url, Field::StatusCode, Field::IsAjax];
        let first = snapshot.project(&fields);
        let second = snapshot.project(&fields);
        assert_eq!(first, second);
        // Response-side field silently absent, order otherwise preserved.
        let names: Vec<&str> = first.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, ["method", "url", "is_ajax"]);
    }

    #[test]
    fn test_response_snapshot_json_body() {
        let facts = ResponseFacts {
            status_code: 200,
            body: r#"{"ok":true}"#.to_string(),
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
        };
        let snapshot = ResponseSnapshot::capture(&facts);
        let projected = snapshot.project(&RESPONSE_FIELDS_ALL);
        assert_eq!(
            projected,
            vec![
                ("status_code", json!(200)),
                ("body", json!({"ok": true})),
                ("response_headers", json!({"Content-Type": "application/json"})),
            ]
        );
    }

    const RESPONSE_FIELDS_ALL: [Field; 3] =
        [Field::StatusCode, Field::Body, Field::ResponseHeaders];

    #[test]
    fn test_response_snapshot_plain_body_flattens_newlines() {
        let facts = ResponseFacts {
            status_code: 500,
            body: "first line\nsecond line".to_string(),
            headers: Vec::new(),
        };
        let snapshot = ResponseSnapshot::capture(&facts);
        let projected = snapshot.project(&[Field::Body]);
        assert_eq!(projected, vec![("body", json!("first line second line"))]);
    }
}
