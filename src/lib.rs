//! Actix-web middleware that logs one structured record per HTTP
//! request/response pair, plus any errors raised while handling it.
//! This middleware inspired by the `actix-web`'s `Logger` middleware.
//!
//! Each handled request produces exactly one line in the configured sink:
//! either tab-delimited (structured sub-values inline-JSON-encoded) or one
//! JSON object per line. Which fields are captured is selected by a
//! [`FilterSpec`]: a named preset, a custom pipe-delimited field list, or
//! the `errors_only` sentinel that logs nothing but the errors themselves.
//!
//! # Examples
//! ## Log the standard field set to a file
//! ```rust,no_run
//! use std::rc::Rc;
//! use actix_web::{web, App, HttpServer};
//! use actix_web_middleware_httplog::{FileSink, FilterSpec, HttpLog, PersistSink};
//!
//! #[actix_web::main]
//! async fn main() -> std::io::Result<()> {
//!     HttpServer::new(|| {
//!         let sink: Rc<dyn PersistSink> =
//!             Rc::new(FileSink::open("/var/log/app/access.log").unwrap());
//!         App::new()
//!             .wrap(HttpLog::new(FilterSpec::Standard, sink))
//!             .route("/", web::get().to(|| async { "Hello world!" }))
//!     })
//!     .bind("127.0.0.1:8080")?;
//!     Ok(())
//! }
//! ```
//! ## Log errors from handlers into the current record
//! ```rust,ignore
//! use actix_web_middleware_httplog::SessionHandle;
//!
//! async fn handler(session: SessionHandle) -> actix_web::Result<&'static str> {
//!     session.warning("upstream retried")?;
//!     Ok("ok")
//! }
//! ```
//! A fatal-level call closes the record immediately and hands back a
//! [`Halt`] the handler returns as its error; the client receives a JSON
//! error body with a 500 status, and the record is still written.
//!
//! # Features
//! - Field selection per record: presets (`standard`, `full`,
//!   `request_only`, `response_only`, `+headers` variants, `errors_only`)
//!   or custom pipe-delimited lists, validated before any request runs
//! - Tab-delimited or newline-delimited JSON output
//! - Error capture with category/severity classification and fatal
//!   short-circuiting
//! - Pluggable persistence sinks (file append, in-memory)
//! - Pattern-based path exclusion
//! - Optional mirroring to the standard `log` crate (feature `log`)
//!
//! # Available fields
//!
//! Request side: `date`, `base`, `url`, `referrer`, `method`, `ip`, `port`,
//! `scheme`, `user_agent`, `content_type`, `content_length`, `accept`,
//! `query`, `data`, `cookies`, `files`, `is_https`, `is_ajax`,
//! `request_headers`. Response side: `status_code`, `body`,
//! `response_headers`.
//!
//! # Feature Flags
//!
//! - `log` (default) - Enable mirroring records to the standard `log` crate

mod error;
mod fault;
mod fields;
mod filter;
mod format;
mod logger;
#[cfg(feature = "log")]
mod mirror;
mod session;
mod sink;
mod snapshot;

pub use crate::error::HttpLogError;
pub use crate::fault::{
    Category, ErrorRecord, Level, Severity, classify, classify_named, classify_or_default, codes,
};
pub use crate::fields::{Field, REQUEST_FIELDS, RESPONSE_FIELDS, Side};
pub use crate::filter::{FilterSpec, Resolution, ResolvedFilter};
pub use crate::format::{RecordFormat, error_line, to_delimited, to_json};
pub use crate::logger::{HttpLog, SessionHandle, StreamLog};
pub use crate::session::{Flow, Halt, LogSession};
pub use crate::sink::{FileSink, MemorySink, PersistSink};
pub use crate::snapshot::{RequestFacts, RequestSnapshot, ResponseFacts, ResponseSnapshot};
