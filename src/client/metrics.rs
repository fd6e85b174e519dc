use prometheus::{exponential_buckets, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};

use std::fmt::{self, Debug};

const STATUS: &[&str] = &["status"];

pub struct Metrics {
    registry: Registry,
    api_server_request_times: Histogram,
    responses_by_status: IntCounterVec,
    transport_errors: IntCounter,
}

impl Debug for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("Metrics")
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Metrics::new()
    }
}

impl Metrics {
    pub fn new() -> Metrics {
        let registry = Registry::new();

        // 5ms, 10ms, 20ms ... ~10s
        let request_time_opts = HistogramOpts::new(
            "api_server_request_time",
            "Total time from sending the request to receiving the response headers",
        )
        .subsystem("client")
        .buckets(exponential_buckets(0.005, 2.0, 12).expect("invalid histogram buckets"));
        let api_server_request_times =
            Histogram::with_opts(request_time_opts).expect("invalid request time histogram");
        registry
            .register(Box::new(api_server_request_times.clone()))
            .expect("failed to register request time histogram");

        let responses_opts = Opts::new(
            "responses",
            "number of responses received from the api server by status code",
        )
        .subsystem("client");
        let responses_by_status =
            IntCounterVec::new(responses_opts, STATUS).expect("invalid responses counter");
        registry
            .register(Box::new(responses_by_status.clone()))
            .expect("failed to register responses counter");

        let transport_error_opts = Opts::new(
            "transport_errors",
            "number of requests that failed without receiving a response",
        )
        .subsystem("client");
        let transport_errors =
            IntCounter::with_opts(transport_error_opts).expect("invalid transport error counter");
        registry
            .register(Box::new(transport_errors.clone()))
            .expect("failed to register transport error counter");

        Metrics {
            registry,
            api_server_request_times,
            responses_by_status,
            transport_errors,
        }
    }

    pub fn client_metrics(&self) -> ClientMetrics {
        ClientMetrics {
            api_server_request_times: self.api_server_request_times.clone(),
            responses_by_status: self.responses_by_status.clone(),
            transport_errors: self.transport_errors.clone(),
        }
    }

    pub fn encode_as_text(&self) -> Result<Vec<u8>, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::with_capacity(4096);
        encoder.encode(self.registry.gather().as_slice(), &mut buffer)?;
        Ok(buffer)
    }
}

#[derive(Clone)]
pub struct ClientMetrics {
    api_server_request_times: Histogram,
    responses_by_status: IntCounterVec,
    transport_errors: IntCounter,
}

impl Debug for ClientMetrics {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("ClientMetrics")
    }
}

impl ClientMetrics {
    pub fn request_started(&self) -> prometheus::HistogramTimer {
        self.api_server_request_times.start_timer()
    }

    pub fn response_received(&self, status: u16) {
        let status = status.to_string();
        self.responses_by_status
            .with_label_values(&[status.as_str()])
            .inc();
    }

    pub fn transport_error(&self) {
        self.transport_errors.inc();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn metrics_are_created_successfully() {
        let _metrics = Metrics::new();
    }

    #[test]
    fn responses_are_counted_by_status() {
        let metrics = Metrics::new();
        let client_metrics = metrics.client_metrics();
        client_metrics.response_received(404);
        client_metrics.response_received(404);
        client_metrics.transport_error();

        let text = String::from_utf8(metrics.encode_as_text().unwrap()).unwrap();
        assert!(text.contains("client_responses{status=\"404\"} 2"), "{}", text);
        assert!(text.contains("client_transport_errors 1"), "{}", text);
    }
}
