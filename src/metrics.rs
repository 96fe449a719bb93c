//! Document pipeline counters.
//!
//! Kept in their own registry and exposed at `/metrics/documents`, next to
//! the HTTP metrics the middleware publishes at `/metrics`.

use lazy_static::lazy_static;
use prometheus::{IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry =
        Registry::new_custom(Some("blanki".to_string()), None).expect("valid registry prefix");
    pub static ref DOCUMENTS_LAID_OUT: IntCounterVec = counter_vec(
        "documents_laid_out_total",
        "Snapshots laid out into pages",
        &["template"],
    );
    pub static ref RENDER_FAILURES: IntCounterVec = counter_vec(
        "render_failures_total",
        "Layouts or PDF renders that failed",
        &["template"],
    );
    pub static ref EXPORTS: IntCounterVec = counter_vec(
        "exports_total",
        "Export actions by kind and outcome",
        &["action", "outcome"],
    );
    pub static ref LIVE_ARTIFACTS: IntGauge = {
        let gauge = IntGauge::new("live_artifacts", "Temporary PDF artifacts not yet released")
            .expect("valid gauge definition");
        register(Box::new(gauge.clone()), "live_artifacts");
        gauge
    };
}

fn counter_vec(name: &str, help: &str, labels: &[&str]) -> IntCounterVec {
    let counter =
        IntCounterVec::new(Opts::new(name, help), labels).expect("valid counter definition");
    register(Box::new(counter.clone()), name);
    counter
}

fn register(collector: Box<dyn prometheus::core::Collector>, name: &str) {
    if let Err(e) = REGISTRY.register(collector) {
        log::warn!("Failed to register metric {}: {}", name, e);
    }
}

/// Text exposition of every document counter.
pub fn gather_text() -> String {
    let encoder = TextEncoder::new();
    match encoder.encode_to_string(&REGISTRY.gather()) {
        Ok(text) => text,
        Err(e) => {
            log::error!("Failed to encode document metrics: {}", e);
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_show_up_in_exposition() {
        EXPORTS.with_label_values(&["download", "ready"]).inc();
        DOCUMENTS_LAID_OUT.with_label_values(&["receipt"]).inc();

        let text = gather_text();
        assert!(text.contains("blanki_exports_total"));
        assert!(text.contains("blanki_documents_laid_out_total"));
    }
}
