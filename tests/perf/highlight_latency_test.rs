use std::time::Instant;

use crate::config::EngineConfig;
use crate::document::Document;
use crate::engine::{HighlightEngine, HostEnvironment};
use crate::settings::MemorySettingsStore;

fn p95_ms(samples: &mut [f64]) -> f64 {
    samples.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let last = samples.len().saturating_sub(1);
    let idx = ((last as f64) * 0.95).round() as usize;
    samples[idx.min(last)]
}

fn large_page() -> Document {
    let text = (0..2_000)
        .map(|i| format!("Paragraph {i:04} mentions the Quarterly Report and a few other words."))
        .collect::<Vec<_>>()
        .join("\n\n");
    Document::from_paragraphs(&text)
}

#[test]
fn highlight_then_clear_p95_under_250ms() {
    let mut engine = HighlightEngine::attach(
        HostEnvironment::trusted("perf"),
        large_page(),
        MemorySettingsStore::default(),
        EngineConfig::default(),
    )
    .unwrap();

    for _ in 0..3 {
        engine.perform_search("quarterly, report, words");
        engine.clear_highlights();
    }

    let mut samples = Vec::with_capacity(15);
    for _ in 0..15 {
        let start = Instant::now();
        engine.perform_search("quarterly, report, words");
        engine.clear_highlights();
        samples.push(start.elapsed().as_secs_f64() * 1000.0);
    }

    let p95 = p95_ms(&mut samples);
    assert!(
        p95 <= 250.0,
        "highlight/clear p95 too high: {p95:.3}ms (budget 250.0ms); samples={samples:?}",
    );
    assert_eq!(engine.pending_timers(), 0);
}
