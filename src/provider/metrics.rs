use prometheus::{exponential_buckets, Histogram, HistogramOpts, IntCounterVec, Opts, Registry};

use std::fmt::{self, Debug};

const METHOD_AND_STATUS: &[&str] = &["method", "status"];

/// Label used for requests that never got a response
pub const NO_RESPONSE: &str = "none";

/// Prometheus metrics for the requests made by an `HttpProvider`
pub struct Metrics {
    registry: Registry,
    api_server_request_times: Histogram,
    provider_calls: IntCounterVec,
}

impl Debug for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("Metrics")
    }
}

impl Metrics {
    pub fn new() -> Result<Metrics, prometheus::Error> {
        let registry = Registry::new();

        // 5ms up to about 10s
        let request_time_opts = HistogramOpts::new(
            "api_server_request_time",
            "Total time from sending the request to receiving the response headers",
        )
        .subsystem("client")
        .buckets(exponential_buckets(0.005, 2.0, 12)?);
        let api_server_request_times = Histogram::with_opts(request_time_opts)?;
        registry.register(Box::new(api_server_request_times.clone()))?;

        let calls_opts = Opts::new("provider_calls", "number of requests to the provider by method and response status")
            .subsystem("client");
        let provider_calls = IntCounterVec::new(calls_opts, METHOD_AND_STATUS)?;
        registry.register(Box::new(provider_calls.clone()))?;

        Ok(Metrics {
            registry,
            api_server_request_times,
            provider_calls,
        })
    }

    pub fn request_started(&self) -> prometheus::HistogramTimer {
        self.api_server_request_times.start_timer()
    }

    pub fn call_completed(&self, method: &str, status: u16) {
        let status = status.to_string();
        self.provider_calls.with_label_values(&[method, status.as_str()]).inc();
    }

    pub fn call_failed(&self, method: &str) {
        self.provider_calls.with_label_values(&[method, NO_RESPONSE]).inc();
    }

    pub fn call_count(&self, method: &str, status: &str) -> u64 {
        self.provider_calls.with_label_values(&[method, status]).get() as u64
    }

    pub fn encode_as_text(&self) -> Result<Vec<u8>, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::with_capacity(4096);
        encoder.encode(self.registry.gather().as_slice(), &mut buffer)?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn calls_are_counted_by_method_and_status() {
        let metrics = Metrics::new().expect("failed to create metrics");
        metrics.call_completed("GET", 200);
        metrics.call_completed("GET", 200);
        metrics.call_completed("GET", 404);
        metrics.call_failed("DELETE");

        assert_eq!(2, metrics.call_count("GET", "200"));
        assert_eq!(1, metrics.call_count("GET", "404"));
        assert_eq!(1, metrics.call_count("DELETE", NO_RESPONSE));

        let text = String::from_utf8(metrics.encode_as_text().unwrap()).unwrap();
        assert!(text.contains("client_provider_calls"));
        assert!(text.contains("client_api_server_request_time"));
    }
}
