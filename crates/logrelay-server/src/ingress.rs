//! `POST /log`: accept a producer's record and queue it for broadcast.

use axum::body::Bytes;
use axum::extract::State;
use axum::response::Json;
use logrelay_core::{LogRecord, RecordError, now_seconds};
use metrics::counter;
use tracing::{debug, error, warn};

use crate::dispatch::EnqueueError;
use crate::errors::IngressError;
use crate::metrics::{
    LOG_RECORDS_DROPPED_TOTAL, LOG_RECORDS_RECEIVED_TOTAL, LOG_RECORDS_REJECTED_TOTAL,
};
use crate::server::AppState;

/// POST /log
///
/// Responds 200 with the accepted record once it is queued. That means the
/// record was received, not that any subscriber got it.
pub async fn ingest_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<LogRecord>, IngressError> {
    counter!(LOG_RECORDS_RECEIVED_TOTAL).increment(1);

    let record = accept(&body, state.config.strict_schema).inspect_err(|e| {
        counter!(LOG_RECORDS_REJECTED_TOTAL, "reason" => rejection_reason(e)).increment(1);
        match e {
            RecordError::InvalidLevel(_) | RecordError::InvalidTimestamp(_) => {
                error!(error = %e, "rejecting record");
            }
            _ => warn!(error = %e, "rejecting record"),
        }
    })?;

    match state.queue.enqueue(record.clone()) {
        Ok(()) => {
            debug!(pending = state.queue.pending(), "record queued for broadcast");
            Ok(Json(record))
        }
        Err(EnqueueError::Full) => {
            counter!(LOG_RECORDS_DROPPED_TOTAL).increment(1);
            warn!("broadcast queue full, dropping record");
            Err(IngressError::Busy)
        }
        Err(EnqueueError::Closed) => Err(IngressError::ShuttingDown),
    }
}

/// Parse and validate a request body, stamping a receipt time if needed.
pub fn accept(body: &[u8], strict: bool) -> Result<LogRecord, RecordError> {
    let value: serde_json::Value = serde_json::from_slice(body)?;
    let mut record = LogRecord::from_value(value)?;
    record.validate(strict)?;
    record.stamp_if_missing(now_seconds());
    Ok(record)
}

fn rejection_reason(err: &RecordError) -> &'static str {
    match err {
        RecordError::NotAnObject | RecordError::Json(_) => "malformed",
        RecordError::MissingField(_) => "missing_field",
        RecordError::InvalidLevel(_) => "level",
        RecordError::InvalidTimestamp(_) => "timestamp",
        RecordError::InvalidMessage(_) => "message",
    }
}

#[cfg(test)]
mod tests {
    use logrelay_core::encode_message;
    use serde_json::json;

    use super::*;

    fn body(value: &serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(value).unwrap()
    }

    #[test]
    fn accepts_complete_record() {
        let input = json!({
            "timestamp": 1_700_000_000,
            "file": "index.rs",
            "function": "main",
            "line_no": 3,
            "level": "SUCCESS",
            "message": encode_message("done"),
            "request_id": "abc",
        });
        let record = accept(&body(&input), true).unwrap();
        assert_eq!(record.fields()["request_id"], "abc");
        assert_eq!(record.timestamp_seconds().unwrap(), Some(1_700_000_000.0));
    }

    #[test]
    fn rejects_non_object() {
        assert!(matches!(
            accept(b"[1, 2]", false),
            Err(RecordError::NotAnObject)
        ));
        assert!(matches!(accept(b"{nope", false), Err(RecordError::Json(_))));
    }

    #[test]
    fn strict_mode_requires_line_no() {
        let input = json!({
            "timestamp": 1_700_000_000,
            "file": "a.rs",
            "function": "f",
            "level": "INFO",
            "message": encode_message("x"),
        });
        assert!(matches!(
            accept(&body(&input), true),
            Err(RecordError::MissingField("line_no"))
        ));
        assert!(accept(&body(&input), false).is_ok());
    }

    #[test]
    fn relaxed_mode_stamps_missing_timestamp() {
        let before = now_seconds();
        let record = accept(&body(&json!({"level": "INFO"})), false).unwrap();
        let stamped = record.timestamp_seconds().unwrap().unwrap();
        assert!(stamped >= before);
    }

    #[test]
    fn invalid_level_is_rejected_even_when_relaxed() {
        let input = json!({"level": "VERBOSE", "message": encode_message("x")});
        assert!(matches!(
            accept(&body(&input), false),
            Err(RecordError::InvalidLevel(_))
        ));
        assert!(matches!(
            accept(&body(&json!({"message": encode_message("x")})), false),
            Err(RecordError::InvalidLevel(_))
        ));
    }

    #[test]
    fn bad_timestamp_and_message_are_rejected() {
        let ts = json!({"level": "INFO", "timestamp": "yesterday"});
        assert!(matches!(
            accept(&body(&ts), false),
            Err(RecordError::InvalidTimestamp(_))
        ));
        let msg = json!({"level": "INFO", "message": "not base64!"});
        assert!(matches!(
            accept(&body(&msg), false),
            Err(RecordError::InvalidMessage(_))
        ));
    }

    #[test]
    fn rejection_reasons_are_stable() {
        assert_eq!(rejection_reason(&RecordError::MissingField("file")), "missing_field");
        assert_eq!(rejection_reason(&RecordError::NotAnObject), "malformed");
    }
}
