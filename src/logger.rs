use std::{
    borrow::Cow,
    cell::RefCell,
    collections::HashSet,
    future::Future,
    marker::PhantomData,
    pin::Pin,
    rc::Rc,
    task::{Context, Poll},
};

use bytes::{Bytes, BytesMut};
use futures_core::ready;
use pin_project_lite::pin_project;
use regex::Regex;
use serde_json::{Map, Value};
use time::OffsetDateTime;

use actix_service::{Service, Transform};
use actix_utils::future::{Ready, ready};
use actix_web::body::{BodySize, MessageBody};
use actix_web::dev::{Payload, ServiceRequest, ServiceResponse};
use actix_web::http::StatusCode;
use actix_web::{
    Error, FromRequest, HttpMessage, HttpRequest, HttpResponse, ResponseError, Result,
};

use crate::error::HttpLogError;
use crate::fault::{ErrorRecord, Level, codes};
use crate::filter::FilterSpec;
use crate::format::RecordFormat;
use crate::session::{Flow, Halt, LogSession};
use crate::sink::PersistSink;
use crate::snapshot::{RequestFacts, ResponseFacts};

/// Middleware that captures one structured record per request/response pair
/// and appends it to a persistence sink.
///
/// Each request gets its own [`LogSession`]; handlers reach it through the
/// [`SessionHandle`] extractor to log errors into the current record.
///
/// # Examples
/// ```rust
/// use std::rc::Rc;
/// use actix_web::App;
/// use actix_web_middleware_httplog::{FilterSpec, HttpLog, MemorySink, PersistSink};
///
/// let sink: Rc<dyn PersistSink> = Rc::new(MemorySink::new());
/// let app = App::new().wrap(HttpLog::new(FilterSpec::Standard, sink));
/// ```
pub struct HttpLog(Rc<Inner>);

#[derive(Clone)]
struct Inner {
    filter: FilterSpec,
    format: RecordFormat,
    sink: Rc<dyn PersistSink>,
    base: String,
    exclude: HashSet<String>,
    exclude_regex: Vec<Regex>,
    #[cfg(feature = "log")]
    mirror: bool,
    log_target: Cow<'static, str>,
}

impl HttpLog {
    /// Create `HttpLog` middleware with the given filter and sink.
    ///
    /// Filter strings are validated by [`FilterSpec::parse`] before this
    /// point; an unknown field name never reaches a request.
    pub fn new(filter: FilterSpec, sink: Rc<dyn PersistSink>) -> HttpLog {
        HttpLog(Rc::new(Inner {
            filter,
            format: RecordFormat::Delimited,
            sink,
            base: "/".to_string(),
            exclude: HashSet::new(),
            exclude_regex: Vec::new(),
            #[cfg(feature = "log")]
            mirror: false,
            log_target: Cow::Borrowed(module_path!()),
        }))
    }

    /// Select the output representation (tab-delimited or JSON).
    pub fn format(mut self, format: RecordFormat) -> Self {
        Rc::get_mut(&mut self.0).unwrap().format = format;
        self
    }

    /// Base path prefix the application is mounted under; stripped from
    /// logged URLs.
    pub fn base<T: Into<String>>(mut self, base: T) -> Self {
        Rc::get_mut(&mut self.0).unwrap().base = base.into();
        self
    }

    /// Ignore and do not log requests for the specified path.
    pub fn exclude<T: Into<String>>(mut self, path: T) -> Self {
        Rc::get_mut(&mut self.0)
            .unwrap()
            .exclude
            .insert(path.into());
        self
    }

    /// Ignore and do not log requests for paths that match regex.
    pub fn exclude_regex<T: Into<String>>(mut self, path: T) -> Self {
        let inner = Rc::get_mut(&mut self.0).unwrap();
        inner.exclude_regex.push(Regex::new(&path.into()).unwrap());
        self
    }

    /// Also emit every record to the standard `log` crate.
    #[cfg(feature = "log")]
    pub fn mirror_to_platform_log(mut self) -> Self {
        Rc::get_mut(&mut self.0).unwrap().mirror = true;
        self
    }

    /// Sets the platform-log mirroring target to `target`.
    ///
    /// By default, the log target is `module_path!()` of the log call
    /// location.
    pub fn log_target(mut self, target: impl Into<Cow<'static, str>>) -> Self {
        let inner = Rc::get_mut(&mut self.0).unwrap();
        inner.log_target = target.into();
        self
    }
}

impl<S, B> Transform<S, ServiceRequest> for HttpLog
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    B: MessageBody,
{
    type Response = ServiceResponse<StreamLog<B>>;
    type Error = Error;
    type Transform = HttpLogMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(HttpLogMiddlewareService {
            service,
            inner: Rc::clone(&self.0),
        }))
    }
}

/// Handle to the current request's [`LogSession`], stored in the request's
/// extensions. Cloning is cheap; all clones point at the same session.
///
/// Usable as an extractor:
/// ```rust,ignore
/// async fn handler(session: SessionHandle) -> actix_web::Result<&'static str> {
///     session.warning("slow upstream")?;
///     Ok("ok")
/// }
/// ```
#[derive(Clone)]
pub struct SessionHandle(Rc<RefCell<LogSession>>);

impl SessionHandle {
    fn new(session: LogSession) -> SessionHandle {
        SessionHandle(Rc::new(RefCell::new(session)))
    }

    /// Log a message at an explicit level. Fatal-category levels close the
    /// session and return [`Flow::Halt`]; the caller must stop handling and
    /// emit the carried error response.
    #[track_caller]
    pub fn log(&self, level: Level, message: impl Into<String>) -> Result<Flow, HttpLogError> {
        self.0.borrow_mut().log(level, message)
    }

    #[track_caller]
    pub fn debug(&self, message: impl Into<String>) -> Result<(), HttpLogError> {
        self.log(Level::Debug, message).map(|_| ())
    }

    #[track_caller]
    pub fn info(&self, message: impl Into<String>) -> Result<(), HttpLogError> {
        self.log(Level::Info, message).map(|_| ())
    }

    #[track_caller]
    pub fn warning(&self, message: impl Into<String>) -> Result<(), HttpLogError> {
        self.log(Level::Warning, message).map(|_| ())
    }

    /// Log a fatal error under the user-error code and halt the request.
    #[track_caller]
    pub fn error(&self, message: impl Into<String>) -> Result<Halt, HttpLogError> {
        self.halting(Level::Error, message)
    }

    /// Log a fatal error and halt the request.
    #[track_caller]
    pub fn fatal(&self, message: impl Into<String>) -> Result<Halt, HttpLogError> {
        self.halting(Level::Fatal, message)
    }

    #[track_caller]
    fn halting(&self, level: Level, message: impl Into<String>) -> Result<Halt, HttpLogError> {
        match self.log(level, message)? {
            Flow::Halt(halt) => Ok(halt),
            Flow::Continue => unreachable!("fatal-category level always halts"),
        }
    }
}

impl FromRequest for SessionHandle {
    type Error = Error;
    type Future = Ready<Result<SessionHandle, Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<SessionHandle>()
                .cloned()
                .ok_or_else(|| {
                    actix_web::error::ErrorInternalServerError(
                        "request log session not available; is HttpLog middleware installed?",
                    )
                }),
        )
    }
}

/// Lets handlers use `?` on session calls; a closed-session or sink error
/// surfaces as a 500.
impl ResponseError for HttpLogError {}

impl ResponseError for Halt {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .content_type("application/json")
            .body(self.body.clone())
    }
}

pin_project! {
    /// Response body wrapper that buffers the streamed bytes and finalizes
    /// the session once the body has fully streamed. The drop point is the
    /// earliest moment the response is known to be complete, so the
    /// response snapshot is taken here and nowhere else.
    pub struct StreamLog<B> {
        #[pin]
        body: B,
        session: Option<Rc<RefCell<LogSession>>>,
        capture_body: bool,
        captured: BytesMut,
        status: u16,
        headers: Vec<(String, String)>,
    }

    impl<B> PinnedDrop for StreamLog<B> {
        fn drop(this: Pin<&mut Self>) {
            let this = this.project();
            if let Some(session) = this.session.take() {
                let mut session = session.borrow_mut();
                if session.is_closed() {
                    return;
                }
                let facts = ResponseFacts {
                    status_code: *this.status,
                    body: String::from_utf8_lossy(this.captured).into_owned(),
                    headers: std::mem::take(this.headers),
                };
                if let Err(_err) = session.finalize_normal(&facts) {
                    // Drop cannot propagate; surface the sink failure on
                    // the platform log instead of swallowing it.
                    #[cfg(feature = "log")]
                    log::error!("failed to persist http log record: {_err}");
                }
            }
        }
    }
}

impl<B: MessageBody> MessageBody for StreamLog<B> {
    type Error = B::Error;

    #[inline]
    fn size(&self) -> BodySize {
        self.body.size()
    }

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Bytes, Self::Error>>> {
        let this = self.project();

        match ready!(this.body.poll_next(cx)) {
            Some(Ok(chunk)) => {
                if *this.capture_body {
                    this.captured.extend_from_slice(&chunk);
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Some(Err(err)) => Poll::Ready(Some(Err(err))),
            None => Poll::Ready(None),
        }
    }
}

/// Logger middleware service.
pub struct HttpLogMiddlewareService<S> {
    inner: Rc<Inner>,
    service: S,
}

impl<S, B> Service<ServiceRequest> for HttpLogMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    B: MessageBody,
{
    type Response = ServiceResponse<StreamLog<B>>;
    type Error = Error;
    type Future = HttpLogResponse<S, B>;

    actix_service::forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let excluded = self.inner.exclude.contains(req.path())
            || self
                .inner
                .exclude_regex
                .iter()
                .any(|r| r.is_match(req.path()));

        if excluded {
            return HttpLogResponse {
                fut: self.service.call(req),
                session: None,
                _phantom: PhantomData,
            };
        }

        let session = LogSession::new(
            &self.inner.filter,
            self.inner.format,
            Rc::clone(&self.inner.sink),
        );
        #[cfg(feature = "log")]
        let session = if self.inner.mirror {
            session.mirror_to(self.inner.log_target.clone())
        } else {
            session
        };

        let mut session = session;
        let facts = request_facts(&req, &self.inner.base);
        // The session is freshly opened; capture cannot be rejected.
        let _ = session.capture_request(&facts);

        let handle = SessionHandle::new(session);
        req.extensions_mut().insert(handle.clone());

        HttpLogResponse {
            fut: self.service.call(req),
            session: Some(handle.0),
            _phantom: PhantomData,
        }
    }
}

pin_project! {
    pub struct HttpLogResponse<S, B>
    where
        B: MessageBody,
        S: Service<ServiceRequest>,
    {
        #[pin]
        fut: S::Future,
        session: Option<Rc<RefCell<LogSession>>>,
        _phantom: PhantomData<B>,
    }
}

impl<S, B> Future for HttpLogResponse<S, B>
where
    B: MessageBody,
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
{
    type Output = Result<ServiceResponse<StreamLog<B>>, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        let res = match ready!(this.fut.poll(cx)) {
            Ok(res) => res,
            Err(err) => {
                // The handler failed outright; record the fault and emit
                // with the status its error response will carry.
                if let Some(session) = this.session.take() {
                    let mut session = session.borrow_mut();
                    if !session.is_closed() {
                        let _ = session.append_error(handler_fault(&err));
                    }
                    if !session.is_closed() {
                        let status = err.as_response_error().status_code().as_u16();
                        let _ = session.finalize_normal(&ResponseFacts {
                            status_code: status,
                            body: String::new(),
                            headers: Vec::new(),
                        });
                    }
                }
                return Poll::Ready(Err(err));
            }
        };

        if let Some(session) = this.session.as_ref() {
            if let Some(error) = res.response().error() {
                let mut session = session.borrow_mut();
                if !session.is_closed() {
                    let _ = session.append_error(handler_fault(error));
                }
            }
        }

        // A fatal error inside the handler already emitted the record and
        // closed the session; nothing is captured past that point.
        let session = match this.session.take() {
            Some(session) if !session.borrow().is_closed() => Some(session),
            _ => None,
        };

        let (capture_body, status, headers) = match &session {
            Some(session) => {
                let error_mode = session.borrow().is_error_mode();
                let headers = if error_mode {
                    Vec::new()
                } else {
                    res.response()
                        .headers()
                        .iter()
                        .map(|(name, value)| {
                            (
                                name.as_str().to_string(),
                                String::from_utf8_lossy(value.as_bytes()).into_owned(),
                            )
                        })
                        .collect()
                };
                (!error_mode, res.status().as_u16(), headers)
            }
            None => (false, 0, Vec::new()),
        };

        Poll::Ready(Ok(res.map_body(move |_, body| StreamLog {
            body,
            session,
            capture_body,
            captured: BytesMut::new(),
            status,
            headers,
        })))
    }
}

/// Classify a handler error as a recoverable runtime fault.
fn handler_fault(err: &Error) -> ErrorRecord {
    ErrorRecord::from_fault_or_default(codes::RECOVERABLE_ERROR, err.to_string(), "", 0)
}

/// Extract the runtime facts the snapshot needs from an actix request.
fn request_facts(req: &ServiceRequest, base: &str) -> RequestFacts {
    let method = req
        .headers()
        .get("x-http-method-override")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_else(|| req.method().as_str())
        .to_string();

    let version = match req.version() {
        actix_http::Version::HTTP_09 => "HTTP/0.9",
        actix_http::Version::HTTP_10 => "HTTP/1.0",
        actix_http::Version::HTTP_11 => "HTTP/1.1",
        actix_http::Version::HTTP_2 => "HTTP/2.0",
        actix_http::Version::HTTP_3 => "HTTP/3.0",
        _ => "unknown",
    };

    let (peer_ip, peer_port) = match req.peer_addr() {
        Some(addr) => (Some(addr.ip().to_string()), Some(addr.port())),
        None => (None, None),
    };

    let headers: Vec<(String, String)> = req
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();

    let cookies = parse_cookies(
        req.headers()
            .get("cookie")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default(),
    );

    let is_ajax = req
        .headers()
        .get("x-requested-with")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == "XMLHttpRequest")
        .unwrap_or(false);

    RequestFacts {
        method,
        url: req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| req.path())
            .to_string(),
        base: base.to_string(),
        version: version.to_string(),
        peer_ip,
        peer_port,
        query: parse_query(req.query_string()),
        // The payload is left untouched for the handler; form and raw body
        // extraction stay with the hosting application.
        form: Value::Object(Map::new()),
        body: None,
        cookies,
        files: Value::Object(Map::new()),
        timestamp: OffsetDateTime::now_utc(),
        is_secure: req.connection_info().scheme() == "https",
        is_ajax,
        headers,
    }
}

/// Decode a query string into a JSON object, last value winning on
/// duplicate keys.
fn parse_query(query: &str) -> Value {
    let mut map = Map::new();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = match pair.split_once('=') {
            Some((key, value)) => (key, value),
            None => (pair, ""),
        };
        map.insert(
            decode_component(key),
            Value::String(decode_component(value)),
        );
    }
    Value::Object(map)
}

fn decode_component(component: &str) -> String {
    let plus_decoded = component.replace('+', " ");
    urlencoding::decode(&plus_decoded)
        .map(|decoded| decoded.into_owned())
        .unwrap_or(plus_decoded)
}

fn parse_cookies(header: &str) -> Value {
    let mut map = Map::new();
    for pair in header.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let (name, value) = match pair.split_once('=') {
            Some((name, value)) => (name, value),
            None => (pair, ""),
        };
        map.insert(name.to_string(), Value::String(value.to_string()));
    }
    Value::Object(map)
}
