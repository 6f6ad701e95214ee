use opentelemetry::{
    global,
    metrics::{Counter, Histogram, MeterProvider},
    KeyValue,
};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::Registry;
use std::collections::BTreeSet;

pub struct Metrics {
    request_counter: Counter<u64>,
    prediction_duration: Histogram<u64>,
    prediction_counter: Counter<u64>,
    pub registry: Registry,
    _provider: SdkMeterProvider,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();
        let exporter = opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .build()?;

        let provider = SdkMeterProvider::builder().with_reader(exporter).build();
        let meter = provider.meter("digit_web");
        global::set_meter_provider(provider.clone());

        let request_counter = meter
            .u64_counter("requests_total")
            .with_description("Total number of requests")
            .build();

        // Small CPU model: most requests land well under 50ms.
        let boundaries = generate_boundaries(&[
            (1, 10, 1),
            (10, 50, 5),
            (50, 250, 25),
            (250, 1000, 250),
        ]);

        let prediction_duration = meter
            .u64_histogram("prediction_duration_ms")
            .with_boundaries(boundaries)
            .with_description("Duration of preprocessing plus inference in milliseconds")
            .build();

        let prediction_counter = meter
            .u64_counter("predictions_total")
            .with_description("Classifications by outcome")
            .build();

        Ok(Metrics {
            request_counter,
            prediction_duration,
            prediction_counter,
            registry,
            _provider: provider,
        })
    }

    pub fn record_request(&self, route: &str) {
        let attributes = [KeyValue::new("route", route.to_string())];
        self.request_counter.add(1, &attributes);
    }

    pub fn record_prediction_duration(&self, duration_ms: u64, route: &str) {
        let attributes = [KeyValue::new("route", route.to_string())];
        self.prediction_duration.record(duration_ms, &attributes);
    }

    pub fn record_prediction(&self, outcome: &str) {
        let attributes = [KeyValue::new("outcome", outcome.to_string())];
        self.prediction_counter.add(1, &attributes);
    }
}

/// Each segment is `(start, end, step)`, both ends inclusive.
fn generate_boundaries(segments: &[(u64, u64, usize)]) -> Vec<f64> {
    segments
        .iter()
        .flat_map(|&(start, end, step)| (start..=end).step_by(step.max(1)))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(|x| x as f64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_boundaries() {
        let get =
            generate_boundaries(&[(2, 22, 10), (22, 26, 2), (26, 46, 20), (46, 146, 100)]);
        let expected = vec![2.0, 12.0, 22.0, 24.0, 26.0, 46.0, 146.0];

        assert_eq!(get, expected);
    }

    #[test]
    fn test_generate_boundaries_sorted_without_duplicates() {
        let get = generate_boundaries(&[(10, 30, 10), (1, 10, 3)]);

        assert_eq!(get, vec![1.0, 4.0, 7.0, 10.0, 20.0, 30.0]);
    }
}
