//! Optional mirroring of emitted records to the standard `log` crate with
//! structured key-values.

use serde_json::Value;

use crate::fault::{ErrorRecord, Severity};

pub(crate) fn emit_record(target: &str, fields: &[(&'static str, Value)], errors: &[ErrorRecord]) {
    let kvs: Vec<(&str, log::kv::Value)> = fields
        .iter()
        .map(|(key, value)| match value {
            Value::Null => (*key, log::kv::Value::null()),
            Value::String(s) => (*key, log::kv::Value::from_display(s)),
            other => (*key, log::kv::Value::from_display(other)),
        })
        .collect();
    let kvs = kvs.as_slice();

    let level = if errors.is_empty() {
        log::Level::Info
    } else {
        log::Level::Warn
    };

    let mut builder = log::Record::builder();

    builder
        .args(format_args!("http log"))
        .level(level)
        .target(target)
        .module_path_static(Some(module_path!()))
        .file_static(Some(file!()))
        .line(Some(line!()))
        .key_values(&kvs);

    log::logger().log(&builder.build());
}

pub(crate) fn emit_error(target: &str, error: &ErrorRecord) {
    let level = match error.severity {
        Severity::Error => log::Level::Error,
        Severity::Warning => log::Level::Warn,
        Severity::Notice | Severity::Info => log::Level::Info,
        Severity::Debug => log::Level::Debug,
    };

    let category = error.category.as_str();
    let kvs: &[(&str, log::kv::Value)] = &[
        ("error_type", log::kv::Value::from_display(&category)),
        ("error_code", log::kv::Value::from(error.code)),
        ("file", log::kv::Value::from_display(&error.file)),
        ("line", log::kv::Value::from(error.line)),
    ];

    // The message arguments borrow locals, so the record is built and
    // logged within one statement.
    log::logger().log(
        &log::Record::builder()
            .args(format_args!("{}", error.message))
            .level(level)
            .target(target)
            .module_path_static(Some(module_path!()))
            .file_static(Some(file!()))
            .line(Some(line!()))
            .key_values(&kvs)
            .build(),
    );
}
