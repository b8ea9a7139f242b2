//! Per-request log session: buffers errors alongside the request lifecycle,
//! detects fatal faults, and emits exactly one record per request (one line
//! per error in errors-only mode).

#[cfg(feature = "log")]
use std::borrow::Cow;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::error::HttpLogError;
use crate::fault::{ErrorRecord, Level};
use crate::filter::{FilterSpec, Resolution};
use crate::format::{self, RecordFormat};
use crate::sink::PersistSink;
use crate::snapshot::{RequestFacts, RequestSnapshot, ResponseFacts, ResponseSnapshot};

/// Forced status on the fatal short-circuit path.
const FATAL_STATUS: u16 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Finalizing,
    Closed,
}

/// Control signal returned from error appends.
///
/// `Halt` means a fatal error closed the session: the caller is
/// contractually required to cease further handling and emit the forced
/// error response it carries.
#[must_use]
#[derive(Debug)]
pub enum Flow {
    Continue,
    Halt(Halt),
}

/// The forced error response produced by a fatal fault: a 500-equivalent
/// status and a JSON error body describing the fault.
#[derive(Debug, Clone)]
pub struct Halt {
    pub status_code: u16,
    pub body: String,
}

impl fmt::Display for Halt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fatal error halted request handling: {}", self.body)
    }
}

impl std::error::Error for Halt {}

/// One request's logging state.
///
/// Lifecycle: created when handling begins, mutated by error-producing
/// calls throughout handling, finalized exactly once, at normal completion
/// or at the first FATAL error. Terminal after finalization: every further
/// mutation fails with [`HttpLogError::SessionClosed`].
///
/// A session is scoped to exactly one request and never shared across
/// requests.
pub struct LogSession {
    resolution: Resolution,
    format: RecordFormat,
    sink: Rc<dyn PersistSink>,
    request: Option<RequestSnapshot>,
    errors: Vec<ErrorRecord>,
    state: State,
    #[cfg(feature = "log")]
    mirror_target: Option<Cow<'static, str>>,
}

impl LogSession {
    /// Create a session for one request. The filter is resolved up front;
    /// an invalid custom filter aborts setup before any capture happens.
    pub fn new(
        filter: &FilterSpec,
        format: RecordFormat,
        sink: Rc<dyn PersistSink>,
    ) -> LogSession {
        LogSession {
            resolution: filter.resolve(),
            format,
            sink,
            request: None,
            errors: Vec::new(),
            state: State::Open,
            #[cfg(feature = "log")]
            mirror_target: None,
        }
    }

    /// Mirror every emitted record to the standard `log` crate under the
    /// given target.
    #[cfg(feature = "log")]
    pub fn mirror_to(mut self, target: impl Into<Cow<'static, str>>) -> Self {
        self.mirror_target = Some(target.into());
        self
    }

    /// Whether the session has emitted its record and gone terminal.
    pub fn is_closed(&self) -> bool {
        self.state == State::Closed
    }

    /// Whether the session is in errors-only mode (no snapshots are built).
    pub fn is_error_mode(&self) -> bool {
        self.resolution == Resolution::ErrorMode
    }

    /// Capture the request snapshot. A no-op in errors-only mode.
    pub fn capture_request(&mut self, facts: &RequestFacts) -> Result<(), HttpLogError> {
        if self.state != State::Open {
            return Err(HttpLogError::SessionClosed);
        }
        if self.resolution != Resolution::ErrorMode {
            self.request = Some(RequestSnapshot::capture(facts));
        }
        Ok(())
    }

    /// Log a message at an explicit level, attributed to the call site.
    /// Fatal-category levels (`error`, `fatal`) short-circuit the session.
    #[track_caller]
    pub fn log(&mut self, level: Level, message: impl Into<String>) -> Result<Flow, HttpLogError> {
        self.append_error(ErrorRecord::from_level(level, message))
    }

    /// Append a classified error to the session's buffer.
    ///
    /// A FATAL record finalizes immediately: the partial record (request
    /// fields plus the forced 500 status, no response body or headers) is
    /// persisted, the session closes, and `Flow::Halt` is returned.
    pub fn append_error(&mut self, record: ErrorRecord) -> Result<Flow, HttpLogError> {
        if self.state != State::Open {
            return Err(HttpLogError::SessionClosed);
        }
        if !record.category.is_fatal() {
            self.errors.push(record);
            return Ok(Flow::Continue);
        }

        let halt = Halt {
            status_code: FATAL_STATUS,
            body: serde_json::to_string(&format::error_value(&record))
                .unwrap_or_else(|_| "{}".to_string()),
        };
        self.errors.push(record);
        self.state = State::Finalizing;
        let result = self.emit_fatal();
        self.state = State::Closed;
        result?;
        Ok(Flow::Halt(halt))
    }

    /// Finalize at normal completion: build the response snapshot, merge
    /// buffered non-fatal errors, and emit via the sink exactly once.
    pub fn finalize_normal(&mut self, response: &ResponseFacts) -> Result<(), HttpLogError> {
        if self.state != State::Open {
            return Err(HttpLogError::SessionClosed);
        }
        self.state = State::Finalizing;
        let result = match &self.resolution {
            Resolution::ErrorMode => self.emit_error_lines(),
            Resolution::Fields(filter) => {
                let mut fields = match &self.request {
                    Some(request) => request.project(&filter.request_fields),
                    None => Vec::new(),
                };
                let snapshot = ResponseSnapshot::capture(response);
                fields.extend(snapshot.project(&filter.response_fields));
                self.emit_record(&fields)
            }
        };
        self.state = State::Closed;
        result
    }

    /// The fatal path never touches the response: only the request
    /// projection and the forced status are included.
    fn emit_fatal(&self) -> Result<(), HttpLogError> {
        match &self.resolution {
            Resolution::ErrorMode => self.emit_error_lines(),
            Resolution::Fields(filter) => {
                let mut fields = match &self.request {
                    Some(request) => request.project(&filter.request_fields),
                    None => Vec::new(),
                };
                if filter.response_fields.contains(&crate::fields::Field::StatusCode) {
                    fields.push(("status_code", Value::from(FATAL_STATUS)));
                }
                self.emit_record(&fields)
            }
        }
    }

    fn emit_record(&self, fields: &[(&'static str, Value)]) -> Result<(), HttpLogError> {
        let line = match self.format {
            RecordFormat::Delimited => format::to_delimited(fields, &self.errors),
            RecordFormat::Json => format::to_json(fields, &self.errors),
        };
        self.sink.persist(&line)?;

        #[cfg(feature = "log")]
        if let Some(target) = &self.mirror_target {
            crate::mirror::emit_record(target, fields, &self.errors);
        }

        Ok(())
    }

    /// Errors-only output: one delimited line per buffered error, each
    /// prefixed with its capture timestamp.
    fn emit_error_lines(&self) -> Result<(), HttpLogError> {
        for error in &self.errors {
            self.sink.persist(&format::error_line(error))?;

            #[cfg(feature = "log")]
            if let Some(target) = &self.mirror_target {
                crate::mirror::emit_error(target, error);
            }
        }
        Ok(())
    }
}
