//! Filter selection: named presets and custom pipe-delimited field lists.

use crate::error::HttpLogError;
use crate::fields::{Field, REQUEST_FIELDS, RESPONSE_FIELDS, Side};

/// The set of fields a log record should carry, selected by name.
///
/// Either one of the named presets, the `errors_only` sentinel, or a custom
/// ordered field list. Custom lists built from a string are validated against
/// the field catalog up front; an unknown name fails with
/// [`HttpLogError::InvalidFilter`] before any request is handled.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FilterSpec {
    #[default]
    Standard,
    Full,
    FullWithHeaders,
    RequestOnly,
    RequestOnlyWithHeaders,
    ResponseOnly,
    ResponseOnlyWithHeaders,
    /// Log only accumulated errors; no request/response snapshots are built.
    ErrorsOnly,
    /// Caller-ordered field selection.
    Custom(Vec<Field>),
}

/// A resolved non-error-mode filter: the fields to capture, partitioned by
/// side, each in selection order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFilter {
    pub request_fields: Vec<Field>,
    pub response_fields: Vec<Field>,
}

/// Outcome of resolving a [`FilterSpec`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Fields(ResolvedFilter),
    /// The `errors_only` sentinel: only error records are emitted.
    ErrorMode,
}

/// Fields of the `standard` preset, in output order.
const STANDARD: [Field; 8] = [
    Field::Date,
    Field::Url,
    Field::Method,
    Field::Ip,
    Field::Query,
    Field::Data,
    Field::StatusCode,
    Field::Body,
];

impl FilterSpec {
    /// Parse a filter selector: a preset name, `errors_only`, or a
    /// pipe-delimited custom field list.
    pub fn parse(spec: &str) -> Result<FilterSpec, HttpLogError> {
        match spec {
            "standard" => Ok(FilterSpec::Standard),
            "full" => Ok(FilterSpec::Full),
            "full+headers" => Ok(FilterSpec::FullWithHeaders),
            "request_only" => Ok(FilterSpec::RequestOnly),
            "request_only+headers" => Ok(FilterSpec::RequestOnlyWithHeaders),
            "response_only" => Ok(FilterSpec::ResponseOnly),
            "response_only+headers" => Ok(FilterSpec::ResponseOnlyWithHeaders),
            "errors_only" => Ok(FilterSpec::ErrorsOnly),
            custom => {
                let fields = custom
                    .split('|')
                    .map(|name| {
                        Field::from_name(name)
                            .ok_or_else(|| HttpLogError::InvalidFilter(name.to_string()))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(FilterSpec::Custom(fields))
            }
        }
    }

    /// Resolve the spec into an ordered, side-partitioned field selection,
    /// or the error-mode sentinel. Pure; order is preserved verbatim.
    pub fn resolve(&self) -> Resolution {
        let fields: Vec<Field> = match self {
            FilterSpec::Standard => STANDARD.to_vec(),
            // `full` already includes both header fields; the `+headers`
            // spelling is accepted as an alias.
            FilterSpec::Full | FilterSpec::FullWithHeaders => REQUEST_FIELDS
                .iter()
                .chain(RESPONSE_FIELDS.iter())
                .copied()
                .collect(),
            FilterSpec::RequestOnly => REQUEST_FIELDS
                .iter()
                .copied()
                .filter(|f| *f != Field::RequestHeaders)
                .collect(),
            FilterSpec::RequestOnlyWithHeaders => REQUEST_FIELDS.to_vec(),
            FilterSpec::ResponseOnly => vec![Field::StatusCode, Field::Body],
            FilterSpec::ResponseOnlyWithHeaders => RESPONSE_FIELDS.to_vec(),
            FilterSpec::ErrorsOnly => return Resolution::ErrorMode,
            FilterSpec::Custom(fields) => fields.clone(),
        };

        let (request_fields, response_fields) =
            fields.into_iter().partition(|f| f.side() == Side::Request);

        Resolution::Fields(ResolvedFilter {
            request_fields,
            response_fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(spec: FilterSpec) -> ResolvedFilter {
        match spec.resolve() {
            Resolution::Fields(f) => f,
            Resolution::ErrorMode => panic!("unexpected error mode"),
        }
    }

    #[test]
    fn test_standard_preset_order() {
        let filter = resolved(FilterSpec::Standard);
        let names: Vec<&str> = filter
            .request_fields
            .iter()
            .chain(filter.response_fields.iter())
            .map(|f| f.name())
            .collect();
        assert_eq!(
            names,
            ["date", "url", "method", "ip", "query", "data", "status_code", "body"]
        );
    }

    #[test]
    fn test_full_covers_catalog() {
        let filter = resolved(FilterSpec::Full);
        assert_eq!(filter.request_fields, REQUEST_FIELDS.to_vec());
        assert_eq!(filter.response_fields, RESPONSE_FIELDS.to_vec());
        assert_eq!(resolved(FilterSpec::FullWithHeaders), filter);
    }

    #[test]
    fn test_header_variants() {
        let filter = resolved(FilterSpec::RequestOnly);
        assert!(!filter.request_fields.contains(&Field::RequestHeaders));
        assert!(filter.response_fields.is_empty());

        let filter = resolved(FilterSpec::RequestOnlyWithHeaders);
        assert!(filter.request_fields.contains(&Field::RequestHeaders));

        let filter = resolved(FilterSpec::ResponseOnly);
        assert_eq!(filter.response_fields, vec![Field::StatusCode, Field::Body]);
        assert!(filter.request_fields.is_empty());

        let filter = resolved(FilterSpec::ResponseOnlyWithHeaders);
        assert_eq!(filter.response_fields, RESPONSE_FIELDS.to_vec());
    }

    #[test]
    fn test_errors_only_sentinel() {
        assert_eq!(FilterSpec::ErrorsOnly.resolve(), Resolution::ErrorMode);
        assert_eq!(
            FilterSpec::parse("errors_only").unwrap(),
            FilterSpec::ErrorsOnly
        );
    }

    #[test]
    fn test_custom_preserves_order_and_partitions() {
        let spec = FilterSpec::parse("status_code|method|url|body").unwrap();
        let filter = resolved(spec);
        assert_eq!(filter.request_fields, vec![Field::Method, Field::Url]);
        assert_eq!(filter.response_fields, vec![Field::StatusCode, Field::Body]);
    }

    #[test]
    fn test_custom_rejects_unknown_name() {
        match FilterSpec::parse("method|bogus|url") {
            Err(HttpLogError::InvalidFilter(name)) => assert_eq!(name, "bogus"),
            other => panic!("expected InvalidFilter, got {other:?}"),
        }
    }

    #[test]
    fn test_no_preset_resolves_empty() {
        for spec in [
            FilterSpec::Standard,
            FilterSpec::Full,
            FilterSpec::FullWithHeaders,
            FilterSpec::RequestOnly,
            FilterSpec::RequestOnlyWithHeaders,
            FilterSpec::ResponseOnly,
            FilterSpec::ResponseOnlyWithHeaders,
        ] {
            let filter = resolved(spec);
            assert!(!filter.request_fields.is_empty() || !filter.response_fields.is_empty());
        }
    }
}
