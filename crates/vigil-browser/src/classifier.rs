//! Mapping from raw engine failures to the closed error taxonomy.

use vigil_core::types::HttpErrorKind;

use crate::engine::EngineError;

/// Chromium network-stack signatures, scanned in declaration order; the
/// first matching row wins.
const ENGINE_ERROR_MAPPING: &[(&str, HttpErrorKind, &str)] = &[
    ("ERR_NAME_NOT_RESOLVED", HttpErrorKind::Connect, "The name did not resolve"),
    ("ERR_CONNECTION_TIMED_OUT", HttpErrorKind::Timeout, "The connection timed out"),
    ("ERR_TIMED_OUT", HttpErrorKind::Timeout, "The operation timed out"),
    ("ERR_CONNECTION_REFUSED", HttpErrorKind::Connect, "The connection was refused"),
    ("ERR_CONNECTION_RESET", HttpErrorKind::Connect, "The connection was reset"),
    ("ERR_ABORTED", HttpErrorKind::Connect, "The operation was aborted"),
    ("ERR_CONTENT_DECODING_FAILED", HttpErrorKind::Decode, "The content decoding failed"),
    ("ERR_TOO_MANY_REDIRECTS", HttpErrorKind::Redirect, "Too many redirects"),
];

/// Outcome of classifying a raw failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: HttpErrorKind,
    pub message: String,
}

impl Classification {
    /// Whether the failure matched a known signature. Unrecognized failures
    /// are worth logging loudly; recognized ones are routine.
    pub fn is_recognized(&self) -> bool {
        self.kind != HttpErrorKind::Unknown
    }
}

/// Map an engine failure to a `(kind, message)` pair.
///
/// The engine's dedicated timeout and abort signals take precedence over
/// the signature table; anything unmatched falls through to `Unknown`
/// carrying the original description. `HttpCode` is never produced here —
/// only the navigation success path sets it.
pub fn classify(error: &EngineError) -> Classification {
    match error {
        EngineError::NavigationTimeout(_) => Classification {
            kind: HttpErrorKind::Timeout,
            message: "The page took too long to load".to_string(),
        },
        EngineError::Aborted => Classification {
            kind: HttpErrorKind::Connect,
            message: "The operation was aborted".to_string(),
        },
        EngineError::Engine(description) => {
            for (signature, kind, message) in ENGINE_ERROR_MAPPING {
                if description.contains(signature) {
                    return Classification {
                        kind: *kind,
                        message: (*message).to_string(),
                    };
                }
            }
            Classification {
                kind: HttpErrorKind::Unknown,
                message: description.clone(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(description: &str) -> EngineError {
        EngineError::Engine(description.to_string())
    }

    #[test]
    fn maps_every_known_signature() {
        let cases = [
            ("net::ERR_NAME_NOT_RESOLVED", HttpErrorKind::Connect, "The name did not resolve"),
            ("net::ERR_CONNECTION_TIMED_OUT", HttpErrorKind::Timeout, "The connection timed out"),
            ("net::ERR_TIMED_OUT", HttpErrorKind::Timeout, "The operation timed out"),
            ("net::ERR_CONNECTION_REFUSED", HttpErrorKind::Connect, "The connection was refused"),
            ("net::ERR_CONNECTION_RESET", HttpErrorKind::Connect, "The connection was reset"),
            ("net::ERR_ABORTED", HttpErrorKind::Connect, "The operation was aborted"),
            ("net::ERR_CONTENT_DECODING_FAILED", HttpErrorKind::Decode, "The content decoding failed"),
            ("net::ERR_TOO_MANY_REDIRECTS", HttpErrorKind::Redirect, "Too many redirects"),
        ];
        for (signature, kind, message) in cases {
            let classification =
                classify(&engine(&format!("{signature} at https://example.com")));
            assert_eq!(classification.kind, kind, "signature {signature}");
            assert_eq!(classification.message, message, "signature {signature}");
        }
    }

    #[test]
    fn navigation_timeout_takes_precedence_over_the_table() {
        let classification = classify(&EngineError::NavigationTimeout(5000));
        assert_eq!(classification.kind, HttpErrorKind::Timeout);
        assert_eq!(classification.message, "The page took too long to load");
    }

    #[test]
    fn abort_maps_to_connect() {
        let classification = classify(&EngineError::Aborted);
        assert_eq!(classification.kind, HttpErrorKind::Connect);
        assert_eq!(classification.message, "The operation was aborted");
    }

    #[test]
    fn first_table_match_wins() {
        // Both signatures present; the earlier table row decides.
        let classification =
            classify(&engine("net::ERR_CONNECTION_REFUSED then net::ERR_NAME_NOT_RESOLVED"));
        assert_eq!(classification.kind, HttpErrorKind::Connect);
        assert_eq!(classification.message, "The name did not resolve");
    }

    #[test]
    fn connection_timed_out_is_not_shadowed_by_generic_timeout() {
        let classification = classify(&engine("net::ERR_CONNECTION_TIMED_OUT"));
        assert_eq!(classification.message, "The connection timed out");
    }

    #[test]
    fn unrecognized_failures_keep_the_original_message() {
        let classification = classify(&engine("Protocol error (Page.navigate): target crashed"));
        assert_eq!(classification.kind, HttpErrorKind::Unknown);
        assert_eq!(
            classification.message,
            "Protocol error (Page.navigate): target crashed"
        );
        assert!(!classification.is_recognized());
    }
}
