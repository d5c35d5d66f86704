pub mod change;
pub mod config;
pub mod contract;
pub mod document;
pub mod engine;
pub mod logging;
pub mod model;
pub mod overlay_state;
pub mod runtime;
pub mod scheduler;
pub mod search;
pub mod settings;
pub mod transport;

#[cfg(test)]
mod tests {
    mod highlight_latency_test {
        include!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../../tests/perf/highlight_latency_test.rs"
        ));
    }
}
