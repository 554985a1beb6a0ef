//! Fetches the best available result set once polling has ended.

use std::future::Future;

use realty_core::ListingRecord;
use serde_json::Value;

use crate::error::ListingsError;
use crate::normalize::normalize_listing;
use crate::types::TerminalState;

/// Anything that can return the raw result body of a snapshot job.
pub trait SnapshotResultSource {
    fn result_payload(
        &self,
        job_id: &str,
    ) -> impl Future<Output = Result<String, ListingsError>> + Send;
}

/// Where a list of listing records sits inside a snapshot payload.
#[derive(Debug, Clone, Copy)]
enum PayloadShape {
    BareArray,
    Field(&'static str),
}

/// Recognized payload shapes, tried in order.
const PAYLOAD_SHAPES: &[PayloadShape] = &[
    PayloadShape::BareArray,
    PayloadShape::Field("results"),
    PayloadShape::Field("data"),
];

impl PayloadShape {
    fn extract(self, value: &Value) -> Option<&Vec<Value>> {
        match self {
            PayloadShape::BareArray => value.as_array(),
            PayloadShape::Field(key) => value.get(key)?.as_array(),
        }
    }
}

/// Parses and normalizes a raw snapshot body.
///
/// The first recognized shape holding at least one record wins. If shapes
/// are recognized but every one of them is empty, the result is an empty
/// list: the job ran and found nothing.
///
/// # Errors
///
/// - [`ListingsError::EmptyPayload`] for a blank body.
/// - [`ListingsError::Deserialize`] if the body is not JSON.
/// - [`ListingsError::UnrecognizedPayload`] if no shape matches.
pub fn parse_payload(body: &str) -> Result<Vec<ListingRecord>, ListingsError> {
    if body.trim().is_empty() {
        return Err(ListingsError::EmptyPayload);
    }

    let value: Value = serde_json::from_str(body).map_err(|e| ListingsError::Deserialize {
        context: "snapshot payload".to_string(),
        source: e,
    })?;

    let mut recognized = false;
    for shape in PAYLOAD_SHAPES {
        if let Some(rows) = shape.extract(&value) {
            recognized = true;
            if !rows.is_empty() {
                return Ok(rows.iter().map(normalize_listing).collect());
            }
        }
    }

    if recognized {
        Ok(Vec::new())
    } else {
        Err(ListingsError::UnrecognizedPayload {
            keys: describe_top_level(&value),
        })
    }
}

fn describe_top_level(value: &Value) -> String {
    match value {
        Value::Object(map) if map.is_empty() => "(empty object)".to_string(),
        Value::Object(map) => map.keys().cloned().collect::<Vec<_>>().join(", "),
        Value::Null => "(null)".to_string(),
        Value::Bool(_) => "(boolean)".to_string(),
        Value::Number(_) => "(number)".to_string(),
        Value::String(_) => "(string)".to_string(),
        Value::Array(_) => "(array)".to_string(),
    }
}

/// Records produced by a search, and whether they came from the fallback
/// dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedListings {
    pub records: Vec<ListingRecord>,
    pub from_fallback: bool,
}

impl FetchedListings {
    #[must_use]
    pub fn fallback(records: &[ListingRecord]) -> Self {
        Self {
            records: records.to_vec(),
            from_fallback: true,
        }
    }

    #[must_use]
    pub fn remote(records: Vec<ListingRecord>) -> Self {
        Self {
            records,
            from_fallback: false,
        }
    }
}

pub struct ResultFetcher<'a, S> {
    source: &'a S,
    fallback: &'a [ListingRecord],
}

impl<'a, S: SnapshotResultSource> ResultFetcher<'a, S> {
    #[must_use]
    pub fn new(source: &'a S, fallback: &'a [ListingRecord]) -> Self {
        Self { source, fallback }
    }

    /// Returns the job's records when it finished with data, otherwise the
    /// fallback dataset unmodified. Download and parse failures also yield
    /// the fallback dataset.
    pub async fn fetch(&self, job_id: &str, terminal: TerminalState) -> FetchedListings {
        if terminal == TerminalState::FallbackRequired {
            return FetchedListings::fallback(self.fallback);
        }

        let body = match self.source.result_payload(job_id).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(job_id, error = %e, "snapshot download failed, using fallback listings");
                return FetchedListings::fallback(self.fallback);
            }
        };

        match parse_payload(&body) {
            Ok(records) => {
                tracing::info!(job_id, records = records.len(), "snapshot records fetched");
                FetchedListings::remote(records)
            }
            Err(e) => {
                tracing::warn!(job_id, error = %e, "snapshot payload unusable, using fallback listings");
                FetchedListings::fallback(self.fallback)
            }
        }
    }
}
