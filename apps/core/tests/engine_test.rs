use std::time::Duration;

use multihighlight_core::change::{MutationRecord, Visibility};
use multihighlight_core::config::EngineConfig;
use multihighlight_core::document::{Document, DocumentError, DocumentHost, Fragment, NodeId};
use multihighlight_core::engine::{EngineError, HighlightEngine, HostEnvironment};
use multihighlight_core::model::PALETTE;
use multihighlight_core::overlay_state::OverlayPhase;
use multihighlight_core::settings::{MemorySettingsStore, Settings, SettingsStore};
use pretty_assertions::assert_eq;

const CLASS: &str = "multi-highlight-term";

type Engine = HighlightEngine<Document, MemorySettingsStore>;

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

fn engine_over(doc: Document) -> Engine {
    HighlightEngine::attach(
        HostEnvironment::trusted("ext"),
        doc,
        MemorySettingsStore::default(),
        EngineConfig::default(),
    )
    .unwrap()
}

fn auto_engine(doc: Document, terms: &[&str]) -> Engine {
    let store = MemorySettingsStore::with_settings(Settings {
        auto_highlight_mode: true,
        default_terms: terms.iter().map(|t| t.to_string()).collect(),
    });
    HighlightEngine::attach(
        HostEnvironment::trusted("ext"),
        doc,
        store,
        EngineConfig::default(),
    )
    .unwrap()
}

fn markup(engine: &Engine) -> String {
    let doc = engine.document();
    doc.render(doc.body())
}

fn marked_texts<S: SettingsStore>(engine: &HighlightEngine<Document, S>) -> Vec<String> {
    let doc = engine.document();
    doc.query_marked(CLASS)
        .into_iter()
        .map(|span| doc.text_content(span))
        .collect()
}

fn add_paragraph(engine: &mut Engine, text: &str) {
    let doc = engine.document_mut();
    let body = doc.body();
    let paragraph = doc.append_element(body, "p").unwrap();
    doc.append_text(paragraph, text).unwrap();
}

#[test]
fn clearing_restores_the_original_markup() {
    let mut engine = engine_over(Document::from_paragraphs("Sunday Fun Day\n\nanother day"));
    let before = markup(&engine);

    engine.perform_search("day");
    assert_eq!(marked_texts(&engine).len(), 3);

    engine.clear_highlights();
    assert_eq!(markup(&engine), before);
    assert!(engine.summary().is_none());
    assert!(engine.current_terms().is_empty());
}

#[test]
fn clearing_twice_is_a_no_op() {
    let mut engine = engine_over(Document::from_paragraphs("Sunday Fun Day"));
    engine.perform_search("fun");
    engine.clear_highlights();
    let once = markup(&engine);

    engine.clear_highlights();
    assert_eq!(markup(&engine), once);
}

#[test]
fn repeating_a_search_yields_identical_markup() {
    let mut engine = engine_over(Document::from_paragraphs("Sunday Fun Day\n\nanother day"));
    engine.perform_search("fun, day");
    let first = markup(&engine);

    engine.perform_search("fun, day");
    assert_eq!(markup(&engine), first);
}

#[test]
fn terms_take_palette_colors_in_order_and_keep_page_casing() {
    let mut engine = engine_over(Document::from_paragraphs("Sunday Fun Day\n\nanother day"));
    engine.perform_search("fun, day");

    assert_eq!(marked_texts(&engine), vec!["day", "Fun", "Day", "day"]);

    let doc = engine.document();
    let styles: Vec<bool> = doc
        .query_marked(CLASS)
        .into_iter()
        .map(|span| {
            doc.style(span)
                .map(|style| style.contains(PALETTE[1].hex()))
                .unwrap_or(false)
        })
        .collect();
    assert_eq!(styles, vec![true, false, true, true]);

    let summary = engine.summary().unwrap();
    let counts: Vec<(&str, usize)> = summary
        .entries
        .iter()
        .map(|entry| (entry.term.as_str(), entry.matches))
        .collect();
    assert_eq!(counts, vec![("fun", 1), ("day", 3)]);
    assert_eq!(summary.entries[0].color, PALETTE[0]);
    assert_eq!(summary.entries[1].color, PALETTE[1]);
}

#[test]
fn unmatched_terms_still_get_a_summary_entry() {
    let mut engine = engine_over(Document::from_paragraphs("nothing to see"));
    let before = markup(&engine);

    engine.perform_search("zebra");

    let summary = engine.summary().unwrap();
    assert_eq!(summary.entries.len(), 1);
    assert_eq!(summary.entries[0].matches, 0);
    assert_eq!(summary.total_matches(), 0);
    assert_eq!(markup(&engine), before);
}

#[test]
fn whitespace_input_leaves_existing_highlights() {
    let mut engine = engine_over(Document::from_paragraphs("Sunday Fun Day"));
    engine.perform_search("fun");

    engine.perform_search("  \n  ");
    assert_eq!(marked_texts(&engine), vec!["Fun"]);
    assert_eq!(engine.current_terms().as_strings(), vec!["fun"]);
}

#[test]
fn delimiter_only_input_clears_without_summary() {
    let mut engine = engine_over(Document::from_paragraphs("Sunday Fun Day"));
    engine.perform_search("fun");

    engine.perform_search(" , ,\n,");
    assert!(marked_texts(&engine).is_empty());
    assert!(engine.summary().is_none());
}

#[test]
fn later_terms_highlight_inside_earlier_spans() {
    let mut engine = engine_over(Document::from_paragraphs("Sunday"));
    let before = markup(&engine);

    engine.perform_search("sunday\nday");
    assert_eq!(marked_texts(&engine), vec!["Sunday", "day"]);
    assert_eq!(engine.summary().unwrap().total_matches(), 2);

    engine.clear_highlights();
    assert_eq!(markup(&engine), before);
}

#[test]
fn excluded_containers_are_not_scanned() {
    let mut doc = Document::new();
    let body = doc.body();
    let script = doc.append_element(body, "script").unwrap();
    doc.append_text(script, "var fun = 1;").unwrap();
    let paragraph = doc.append_element(body, "p").unwrap();
    doc.append_text(paragraph, "having fun").unwrap();

    let mut engine = engine_over(doc);
    engine.perform_search("fun");
    assert_eq!(engine.summary().unwrap().entries[0].matches, 1);
}

#[test]
fn attach_refuses_an_unverified_environment() {
    let mut doc = Document::from_paragraphs("Sunday Fun Day");
    let before = doc.render(doc.body());

    let result = HighlightEngine::attach(
        HostEnvironment {
            secure_context: false,
            controller_id: Some("ext".into()),
        },
        &mut doc,
        MemorySettingsStore::default(),
        EngineConfig::default(),
    );

    assert!(matches!(result, Err(EngineError::EnvironmentUnavailable(_))));
    assert_eq!(doc.render(doc.body()), before);
}

#[test]
fn auto_mode_highlights_after_the_initial_delay() {
    let mut engine = auto_engine(Document::from_paragraphs("Sunday Fun Day"), &["fun"]);
    assert_eq!(engine.pending_timers(), 1);

    engine.pump(ms(999));
    assert!(marked_texts(&engine).is_empty());

    engine.pump(ms(1_000));
    assert_eq!(marked_texts(&engine), vec!["Fun"]);
    assert_eq!(engine.search_passes(), 1);
}

#[test]
fn auto_mode_without_terms_schedules_nothing() {
    let engine = auto_engine(Document::from_paragraphs("Sunday Fun Day"), &[]);
    assert_eq!(engine.pending_timers(), 0);
}

#[test]
fn added_content_is_rehighlighted_after_settling() {
    let mut engine = auto_engine(Document::from_paragraphs("Sunday Fun Day"), &["fun"]);
    engine.pump(ms(1_000));

    add_paragraph(&mut engine, "more fun here");
    engine.pump(ms(1_100));
    assert!(marked_texts(&engine).is_empty());
    assert!(engine.rehighlight_pending());

    engine.pump(ms(1_400));
    assert_eq!(marked_texts(&engine), vec!["Fun", "fun"]);
    assert_eq!(engine.search_passes(), 2);

    // The pass's own writes never trigger another one.
    engine.pump(ms(10_000));
    assert_eq!(engine.search_passes(), 2);
    assert_eq!(engine.pending_timers(), 0);
}

#[test]
fn bursts_of_changes_coalesce_into_one_pass() {
    let mut engine = auto_engine(Document::from_paragraphs("Sunday Fun Day"), &["fun"]);
    engine.pump(ms(1_000));

    for (step, at) in [1_100, 1_200, 1_300].into_iter().enumerate() {
        add_paragraph(&mut engine, &format!("fun number {step}"));
        engine.pump(ms(at));
    }
    assert_eq!(engine.pending_timers(), 1);

    engine.pump(ms(1_599));
    assert_eq!(engine.search_passes(), 1);

    engine.pump(ms(1_600));
    assert_eq!(engine.search_passes(), 2);
    assert_eq!(marked_texts(&engine).len(), 4);
}

#[test]
fn blank_text_changes_are_ignored() {
    let mut engine = auto_engine(Document::from_paragraphs("Sunday Fun Day"), &["fun"]);
    engine.pump(ms(1_000));

    let doc = engine.document_mut();
    let body = doc.body();
    let text = doc.append_text(body, "   ").unwrap();
    doc.set_text(text, "\t").unwrap();

    engine.pump(ms(1_100));
    assert!(!engine.rehighlight_pending());
    assert_eq!(marked_texts(&engine), vec!["Fun"]);
}

#[test]
fn manual_searches_do_not_feed_the_change_observer() {
    let mut engine = auto_engine(Document::from_paragraphs("Sunday Fun Day"), &["fun"]);
    engine.pump(ms(1_000));

    engine.perform_search("day");
    engine.clear_highlights();
    engine.perform_search("sun");
    engine.pump(ms(1_050));

    assert!(!engine.rehighlight_pending());
    assert_eq!(marked_texts(&engine), vec!["Sun"]);
}

#[test]
fn external_changes_made_before_a_search_are_still_observed() {
    let mut engine = auto_engine(Document::from_paragraphs("Sunday Fun Day"), &["fun"]);
    engine.pump(ms(1_000));

    add_paragraph(&mut engine, "late fun");
    engine.perform_search("day");
    engine.pump(ms(1_050));

    assert!(engine.rehighlight_pending());
}

#[test]
fn becoming_visible_rehighlights_after_settling() {
    let mut engine = auto_engine(Document::from_paragraphs("Sunday Fun Day"), &["fun"]);
    engine.pump(ms(1_000));

    engine.handle_visibility_change(Visibility::Visible);
    assert!(!engine.rehighlight_pending());

    engine.handle_visibility_change(Visibility::Hidden);
    assert_eq!(marked_texts(&engine), vec!["Fun"]);

    engine.handle_visibility_change(Visibility::Visible);
    assert!(marked_texts(&engine).is_empty());

    engine.advance_to(ms(1_499));
    assert!(marked_texts(&engine).is_empty());
    engine.advance_to(ms(1_500));
    assert_eq!(marked_texts(&engine), vec!["Fun"]);
}

#[test]
fn disabling_auto_mode_drops_the_pending_rehighlight() {
    let mut engine = auto_engine(Document::from_paragraphs("Sunday Fun Day"), &["fun"]);
    engine.set_auto_highlight_mode(false);

    engine.pump(ms(2_000));
    assert!(marked_texts(&engine).is_empty());
    assert!(!engine.state().auto_highlight_mode);
}

#[test]
fn enabling_auto_mode_searches_defaults_immediately() {
    let mut engine = engine_over(Document::from_paragraphs("Sunday Fun Day"));
    engine.set_default_terms([" fun ", "", "day"]);
    assert_eq!(engine.settings().default_terms, vec!["fun", "day"]);

    assert!(engine.toggle_auto_highlight());
    assert_eq!(marked_texts(&engine), vec!["day", "Fun", "Day"]);
    assert!(engine.store().settings().auto_highlight_mode);
    assert_eq!(engine.store().save_count(), 2);
}

#[test]
fn re_highlight_requires_armed_auto_mode() {
    let mut engine = engine_over(Document::from_paragraphs("Sunday Fun Day"));
    engine.set_default_terms(["fun"]);
    assert!(!engine.re_highlight());

    engine.set_auto_highlight_mode(true);
    engine.perform_search("day");
    assert!(engine.re_highlight());
    assert_eq!(marked_texts(&engine), vec!["Fun"]);
}

#[test]
fn store_failures_do_not_roll_back_state() {
    let mut engine = HighlightEngine::attach(
        HostEnvironment::trusted("ext"),
        Document::from_paragraphs("Sunday Fun Day"),
        MemorySettingsStore::failing(),
        EngineConfig::default(),
    )
    .unwrap();
    assert_eq!(engine.settings(), &Settings::default());

    engine.set_default_terms(["fun"]);
    engine.set_auto_highlight_mode(true);
    assert!(engine.settings().auto_highlight_ready());
    assert_eq!(marked_texts(&engine), vec!["Fun"]);
}

#[test]
fn escape_fades_the_overlay_out() {
    let mut engine = engine_over(Document::new());
    assert_eq!(engine.toggle_overlay(), OverlayPhase::Shown);
    assert!(engine.is_active());

    assert!(!engine.handle_key("Enter"));
    assert!(engine.handle_key("Escape"));
    assert_eq!(engine.overlay_phase(), OverlayPhase::FadingOut);
    assert!(!engine.is_active());

    engine.advance_to(ms(199));
    assert_eq!(engine.overlay_phase(), OverlayPhase::FadingOut);
    engine.advance_to(ms(200));
    assert_eq!(engine.overlay_phase(), OverlayPhase::Hidden);
    assert!(!engine.handle_key("Escape"));
}

#[test]
fn reopening_during_the_fade_cancels_the_hide() {
    let mut engine = engine_over(Document::new());
    engine.toggle_overlay();
    assert_eq!(engine.toggle_overlay(), OverlayPhase::FadingOut);
    assert_eq!(engine.toggle_overlay(), OverlayPhase::Shown);

    engine.advance_to(ms(1_000));
    assert_eq!(engine.overlay_phase(), OverlayPhase::Shown);
    assert!(engine.close_overlay());
    assert!(!engine.close_overlay());
}

#[test]
fn shutdown_cancels_timers_and_returns_the_document() {
    let engine = auto_engine(Document::from_paragraphs("Sunday Fun Day"), &["fun"]);
    let doc = engine.shutdown();
    assert_eq!(doc.render(doc.body()), "<body><p>Sunday Fun Day</p></body>");
}

#[test]
fn state_snapshot_reflects_the_last_search() {
    let mut engine = auto_engine(Document::from_paragraphs("Sunday Fun Day"), &["fun"]);
    engine.perform_search("day");

    let state = engine.state();
    assert!(!state.is_active);
    assert_eq!(state.overlay_phase, OverlayPhase::Hidden);
    assert!(state.auto_highlight_mode);
    assert_eq!(state.default_terms, vec!["fun"]);
    assert_eq!(state.current_terms.as_strings(), vec!["day"]);
    assert_eq!(state.summary.map(|summary| summary.total_matches()), Some(2));
}

#[test]
fn dismissing_the_summary_keeps_the_spans() {
    let mut engine = engine_over(Document::from_paragraphs("Sunday Fun Day"));
    engine.perform_search("day");
    let highlighted = markup(&engine);

    assert!(engine.dismiss_summary());
    assert!(engine.summary().is_none());
    assert!(!engine.dismiss_summary());
    assert_eq!(markup(&engine), highlighted);
    assert_eq!(marked_texts(&engine), vec!["day", "Day"]);
    assert_eq!(engine.current_terms().as_strings(), vec!["day"]);

    engine.clear_highlights();
    assert_eq!(markup(&engine), "<body><p>Sunday Fun Day</p></body>");
}

enum Interference {
    Detach(NodeId),
    Rewrite(NodeId, &'static str),
}

// Page script that changes the document while the first rewrite lands.
struct InterferingHost {
    inner: Document,
    pending: Option<Interference>,
}

impl DocumentHost for InterferingHost {
    fn body(&self) -> NodeId {
        self.inner.body()
    }

    fn find_text_nodes(&self, root: NodeId) -> Vec<NodeId> {
        self.inner.find_text_nodes(root)
    }

    fn text_of(&self, node: NodeId) -> Option<&str> {
        self.inner.text_of(node)
    }

    fn tag_name(&self, node: NodeId) -> Option<&str> {
        self.inner.tag_name(node)
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.inner.parent(node)
    }

    fn is_connected(&self, node: NodeId) -> bool {
        self.inner.is_connected(node)
    }

    fn text_content(&self, node: NodeId) -> String {
        self.inner.text_content(node)
    }

    fn replace_node(
        &mut self,
        old: NodeId,
        fragments: Vec<Fragment>,
    ) -> Result<Vec<NodeId>, DocumentError> {
        match self.pending.take() {
            Some(Interference::Detach(node)) => self.inner.remove(node)?,
            Some(Interference::Rewrite(node, text)) => self.inner.set_text(node, text)?,
            None => {}
        }
        self.inner.replace_node(old, fragments)
    }

    fn query_marked(&self, class: &str) -> Vec<NodeId> {
        self.inner.query_marked(class)
    }

    fn merge_adjacent_text(&mut self, root: NodeId) -> usize {
        self.inner.merge_adjacent_text(root)
    }

    fn take_mutations(&mut self) -> Vec<MutationRecord> {
        self.inner.take_mutations()
    }
}

fn interfering_engine(
    make: impl FnOnce(&Document) -> Interference,
) -> HighlightEngine<InterferingHost, MemorySettingsStore> {
    let inner = Document::from_paragraphs("fun one\n\nfun two");
    let pending = Some(make(&inner));
    HighlightEngine::attach(
        HostEnvironment::trusted("ext"),
        InterferingHost { inner, pending },
        MemorySettingsStore::default(),
        EngineConfig::default(),
    )
    .unwrap()
}

fn second_paragraph(doc: &Document) -> NodeId {
    let texts = doc.find_text_nodes(doc.body());
    doc.parent(texts[1]).unwrap()
}

#[test]
fn text_detached_mid_search_is_skipped_and_not_counted() {
    let mut engine = interfering_engine(|doc| Interference::Detach(second_paragraph(doc)));
    let detached = second_paragraph(&engine.document().inner);

    engine.perform_search("fun");

    let doc = &engine.document().inner;
    assert_eq!(engine.summary().map(|summary| summary.total_matches()), Some(1));
    assert_eq!(doc.query_marked(CLASS).len(), 1);
    assert_eq!(doc.render(doc.body()).matches(CLASS).count(), 1);
    assert_eq!(doc.render(detached), "<p>fun two</p>");

    engine.clear_highlights();
    let doc = &engine.document().inner;
    assert_eq!(doc.render(doc.body()), "<body><p>fun one</p></body>");
}

#[test]
fn text_rewritten_mid_search_is_skipped_and_not_counted() {
    let mut engine = interfering_engine(|doc| {
        let texts = doc.find_text_nodes(doc.body());
        Interference::Rewrite(texts[1], "gone")
    });

    engine.perform_search("fun");

    let doc = &engine.document().inner;
    assert_eq!(engine.summary().map(|summary| summary.total_matches()), Some(1));
    assert_eq!(doc.query_marked(CLASS).len(), 1);
    assert_eq!(doc.text_content(doc.body()), "fun onegone");
}
