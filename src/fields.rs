//! The closed vocabulary of loggable request/response fields.

/// Which side of the HTTP exchange a field is captured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Request,
    Response,
}

/// A loggable field name.
///
/// The set is closed: every field belongs to exactly one [`Side`], and the
/// partition is fixed at compile time. Filter resolution validates names
/// against this catalog, so projection never has to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// Capture timestamp. Example: 2019-05-29 18:51:00
    Date,
    /// Base path prefix stripped from the URL. Example: /app
    Base,
    /// Request URL, normalized against the base prefix. Example: /items?x=1
    Url,
    /// Referrer header value.
    Referrer,
    /// HTTP method, uppercased. Example: GET
    Method,
    /// Client IP address. Example: 192.168.0.1
    Ip,
    /// Client port.
    Port,
    /// HTTP protocol version. Example: HTTP/1.1
    Scheme,
    /// User agent header value.
    UserAgent,
    /// Content-Type header value.
    ContentType,
    /// Content-Length header value.
    ContentLength,
    /// Accept header value.
    Accept,
    /// Parsed query-string parameters.
    Query,
    /// Request data: form parameters, or the parsed JSON body for
    /// application/json requests.
    Data,
    /// Request cookies.
    Cookies,
    /// Uploaded files metadata.
    Files,
    /// 1 if the request came over TLS, 0 otherwise.
    IsHttps,
    /// 1 if the request was made via XMLHttpRequest, 0 otherwise.
    IsAjax,
    /// All request headers.
    RequestHeaders,
    /// Response status code. Example: 200
    StatusCode,
    /// Response body; parsed structure if the body is valid JSON.
    Body,
    /// All response headers.
    ResponseHeaders,
}

/// Every request-side field, in catalog order.
pub const REQUEST_FIELDS: [Field; 19] = [
    Field::Date,
    Field::Base,
    Field::Url,
    Field::Referrer,
    Field::Method,
    Field::Ip,
    Field::Port,
    Field::Scheme,
    Field::UserAgent,
    Field::ContentType,
    Field::ContentLength,
    Field::Accept,
    Field::Query,
    Field::Data,
    Field::Cookies,
    Field::Files,
    Field::IsHttps,
    Field::IsAjax,
    Field::RequestHeaders,
];

/// Every response-side field, in catalog order.
pub const RESPONSE_FIELDS: [Field; 3] = [Field::StatusCode, Field::Body, Field::ResponseHeaders];

impl Field {
    /// The wire name of the field, as it appears in filters and JSON output.
    pub fn name(self) -> &'static str {
        match self {
            Field::Date => "date",
            Field::Base => "base",
            Field::Url => "url",
            Field::Referrer => "referrer",
            Field::Method => "method",
            Field::Ip => "ip",
            Field::Port => "port",
            Field::Scheme => "scheme",
            Field::UserAgent => "user_agent",
            Field::ContentType => "content_type",
            Field::ContentLength => "content_length",
            Field::Accept => "accept",
            Field::Query => "query",
            Field::Data => "data",
            Field::Cookies => "cookies",
            Field::Files => "files",
            Field::IsHttps => "is_https",
            Field::IsAjax => "is_ajax",
            Field::RequestHeaders => "request_headers",
            Field::StatusCode => "status_code",
            Field::Body => "body",
            Field::ResponseHeaders => "response_headers",
        }
    }

    /// Which side of the exchange this field is captured from.
    pub fn side(self) -> Side {
        match self {
            Field::StatusCode | Field::Body | Field::ResponseHeaders => Side::Response,
            _ => Side::Request,
        }
    }

    /// Look a field up by its wire name. `None` for anything outside the
    /// catalog.
    pub fn from_name(name: &str) -> Option<Field> {
        REQUEST_FIELDS
            .iter()
            .chain(RESPONSE_FIELDS.iter())
            .copied()
            .find(|f| f.name() == name)
    }
}
