//! Prometheus metrics recording.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use vigil_core::types::{HttpErrorKind, HttpResponse};

/// Install the Prometheus metrics recorder and return the handle for rendering.
pub fn install_prometheus_recorder() -> PrometheusHandle {
    let builder = PrometheusBuilder::new();
    builder
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
}

/// Record one executed fetch with its duration and outcome.
pub fn record_fetch(response: &HttpResponse, duration_secs: f64) {
    let outcome = match response.error {
        None => "success",
        Some(_) => "error",
    };
    let labels = [("outcome", outcome.to_string())];
    metrics::counter!("fetches_total", &labels).increment(1);
    metrics::histogram!("fetch_duration_seconds", &labels).record(duration_secs);

    if let Some(kind) = response.error {
        let labels = [("kind", error_kind_label(kind).to_string())];
        metrics::counter!("fetch_errors_total", &labels).increment(1);
    }
}

fn error_kind_label(kind: HttpErrorKind) -> &'static str {
    match kind {
        HttpErrorKind::Connect => "connect",
        HttpErrorKind::Timeout => "timeout",
        HttpErrorKind::Decode => "decode",
        HttpErrorKind::Redirect => "redirect",
        HttpErrorKind::HttpCode => "http_code",
        HttpErrorKind::Unknown => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_fetch_does_not_panic() {
        // The metrics crate uses a no-op recorder by default.
        record_fetch(&HttpResponse::default(), 0.123);
        record_fetch(
            &HttpResponse::from_error(HttpErrorKind::Timeout, "The page took too long to load"),
            1.5,
        );
    }

    #[test]
    fn test_every_error_kind_has_a_label() {
        let kinds = [
            HttpErrorKind::Connect,
            HttpErrorKind::Timeout,
            HttpErrorKind::Decode,
            HttpErrorKind::Redirect,
            HttpErrorKind::HttpCode,
            HttpErrorKind::Unknown,
        ];
        let labels: Vec<_> = kinds.into_iter().map(error_kind_label).collect();
        let mut distinct = labels.clone();
        distinct.sort_unstable();
        distinct.dedup();
        assert_eq!(distinct.len(), labels.len());
    }
}
