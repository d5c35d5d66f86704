use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::change::{is_significant, MutationRecord, Visibility, VisibilityTracker};
use crate::config::EngineConfig;
use crate::document::{DocumentHost, Fragment, NodeId};
use crate::model::{
    color_for_index, Color, MatchSet, ResultsSummary, SummaryEntry, Term, TermList,
};
use crate::overlay_state::{OverlayPhase, OverlayState, OverlayTransition};
use crate::scheduler::Scheduler;
use crate::search::scan_text;
use crate::settings::{Settings, SettingsStore};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("host environment unavailable: {0}")]
    EnvironmentUnavailable(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEnvironment {
    pub secure_context: bool,
    pub controller_id: Option<String>,
}

impl HostEnvironment {
    pub fn trusted(controller_id: &str) -> Self {
        Self {
            secure_context: true,
            controller_id: Some(controller_id.to_string()),
        }
    }

    pub fn verify(&self) -> Result<&str, EngineError> {
        if !self.secure_context {
            return Err(EngineError::EnvironmentUnavailable("not a secure context"));
        }
        match self.controller_id.as_deref() {
            Some(id) if !id.is_empty() => Ok(id),
            _ => Err(EngineError::EnvironmentUnavailable(
                "controller bridge is not initialized",
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RehighlightCause {
    PageLoad,
    ContentChanged,
    BecameVisible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerSlot {
    Rehighlight,
    FinishHide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Task {
    Rehighlight(RehighlightCause),
    FinishHide,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineState {
    pub is_active: bool,
    pub overlay_phase: OverlayPhase,
    pub auto_highlight_mode: bool,
    pub default_terms: Vec<String>,
    pub current_terms: TermList,
    pub summary: Option<ResultsSummary>,
}

pub struct HighlightEngine<D: DocumentHost, S: SettingsStore> {
    document: D,
    store: S,
    config: EngineConfig,
    environment: HostEnvironment,
    overlay: OverlayState,
    settings: Settings,
    current_terms: TermList,
    summary: Option<ResultsSummary>,
    visibility: VisibilityTracker,
    timers: Scheduler<TimerSlot, Task>,
    deferred: Vec<MutationRecord>,
    search_passes: usize,
}

impl<D: DocumentHost, S: SettingsStore> HighlightEngine<D, S> {
    pub fn attach(
        environment: HostEnvironment,
        mut document: D,
        store: S,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        if let Err(error) = environment.verify() {
            warn!(%error, "refusing to attach highlight engine");
            return Err(error);
        }

        let settings = match store.load() {
            Ok(settings) => settings,
            Err(error) => {
                warn!(%error, "failed to load settings; using defaults");
                Settings::default()
            }
        };

        // Changes made before attach are not observed.
        document.take_mutations();

        let mut engine = Self {
            document,
            store,
            config,
            environment,
            overlay: OverlayState::default(),
            settings,
            current_terms: TermList::default(),
            summary: None,
            visibility: VisibilityTracker::default(),
            timers: Scheduler::default(),
            deferred: Vec::new(),
            search_passes: 0,
        };

        info!(
            auto_highlight_mode = engine.settings.auto_highlight_mode,
            default_terms = engine.settings.default_terms.len(),
            "highlight engine attached"
        );

        if engine.settings.auto_highlight_ready() {
            let delay = engine.config.initial_highlight_delay();
            engine.schedule_rehighlight(RehighlightCause::PageLoad, delay);
        }

        Ok(engine)
    }

    pub fn perform_search(&mut self, raw: &str) {
        if raw.trim().is_empty() {
            debug!("ignoring empty search input");
            return;
        }
        self.write_pass(|engine| engine.search_pass(raw));
    }

    pub fn clear_highlights(&mut self) {
        self.write_pass(Self::clear_pass);
    }

    // Hides the summary only; spans stay until the next clear or search.
    pub fn dismiss_summary(&mut self) -> bool {
        let dismissed = self.summary.take().is_some();
        if dismissed {
            debug!("results summary dismissed");
        }
        dismissed
    }

    pub fn toggle_overlay(&mut self) -> OverlayPhase {
        match self.overlay.toggle() {
            OverlayTransition::Show => {
                if self.timers.cancel(TimerSlot::FinishHide) {
                    debug!("cancelled pending overlay hide");
                }
                info!("overlay shown");
            }
            OverlayTransition::BeginHide => self.schedule_finish_hide(),
        }
        self.overlay.phase()
    }

    pub fn close_overlay(&mut self) -> bool {
        if !self.overlay.close() {
            return false;
        }
        self.schedule_finish_hide();
        true
    }

    pub fn handle_key(&mut self, key: &str) -> bool {
        if key != "Escape" || !self.overlay.on_escape() {
            return false;
        }
        self.schedule_finish_hide();
        true
    }

    pub fn set_auto_highlight_mode(&mut self, enabled: bool) {
        self.settings.auto_highlight_mode = enabled;
        self.persist_settings();
        info!(enabled, "auto-highlight mode updated");

        if !enabled {
            self.timers.cancel(TimerSlot::Rehighlight);
            return;
        }
        if !self.settings.default_terms.is_empty() {
            let raw = self.settings.default_term_list().joined();
            self.perform_search(&raw);
        }
    }

    pub fn toggle_auto_highlight(&mut self) -> bool {
        let enabled = !self.settings.auto_highlight_mode;
        self.set_auto_highlight_mode(enabled);
        enabled
    }

    pub fn set_default_terms<I, T>(&mut self, terms: I)
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        self.settings.default_terms = TermList::from_pieces(terms).as_strings();
        self.persist_settings();
        info!(
            default_terms = self.settings.default_terms.len(),
            "default terms updated"
        );
    }

    pub fn re_highlight(&mut self) -> bool {
        if !self.settings.auto_highlight_ready() {
            debug!("re-highlight requested without armed auto mode");
            return false;
        }
        let raw = self.settings.default_term_list().joined();
        self.write_pass(|engine| {
            engine.clear_pass();
            engine.search_pass(&raw);
        });
        true
    }

    pub fn handle_visibility_change(&mut self, visibility: Visibility) {
        if !self.visibility.transition(visibility) {
            return;
        }
        if !self.settings.auto_highlight_ready() {
            return;
        }

        debug!("page became visible; clearing before re-highlight");
        self.clear_highlights();
        let delay = self.config.visibility_settle_delay();
        self.schedule_rehighlight(RehighlightCause::BecameVisible, delay);
    }

    pub fn handle_mutations(&mut self, records: &[MutationRecord]) {
        if !self.settings.auto_highlight_ready() || records.is_empty() {
            return;
        }
        if !is_significant(&self.document, records) {
            trace!(records = records.len(), "ignoring insignificant mutations");
            return;
        }

        debug!(records = records.len(), "content changed; clearing before re-highlight");
        self.clear_highlights();
        let delay = self.config.mutation_settle_delay();
        self.schedule_rehighlight(RehighlightCause::ContentChanged, delay);
    }

    /// One turn of the host event loop: run timers due by `now`, then
    /// deliver the mutation records observed since the previous turn.
    pub fn pump(&mut self, now: Duration) {
        self.advance_to(now);

        let mut batch = std::mem::take(&mut self.deferred);
        batch.extend(self.document.take_mutations());
        if !batch.is_empty() {
            self.handle_mutations(&batch);
            self.advance_to(now);
        }
    }

    pub fn advance_to(&mut self, now: Duration) {
        while let Some(task) = self.timers.pop_due(now) {
            self.run_task(task);
        }
        self.timers.advance_to(now);
    }

    pub fn shutdown(mut self) -> D {
        let cancelled = self.timers.cancel_all();
        info!(cancelled, "highlight engine detached");
        self.document
    }

    pub fn state(&self) -> EngineState {
        EngineState {
            is_active: self.overlay.is_active(),
            overlay_phase: self.overlay.phase(),
            auto_highlight_mode: self.settings.auto_highlight_mode,
            default_terms: self.settings.default_terms.clone(),
            current_terms: self.current_terms.clone(),
            summary: self.summary.clone(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.overlay.is_active()
    }

    pub fn overlay_phase(&self) -> OverlayPhase {
        self.overlay.phase()
    }

    pub fn summary(&self) -> Option<&ResultsSummary> {
        self.summary.as_ref()
    }

    pub fn current_terms(&self) -> &TermList {
        &self.current_terms
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn environment(&self) -> &HostEnvironment {
        &self.environment
    }

    pub fn set_environment(&mut self, environment: HostEnvironment) {
        self.environment = environment;
    }

    pub fn is_trusted_sender(&self, sender_id: Option<&str>) -> bool {
        match (self.environment.verify(), sender_id) {
            (Ok(controller), Some(sender)) => controller == sender,
            _ => false,
        }
    }

    pub fn document(&self) -> &D {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut D {
        &mut self.document
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn now(&self) -> Duration {
        self.timers.now()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.pending()
    }

    pub fn rehighlight_pending(&self) -> bool {
        self.timers.is_pending(TimerSlot::Rehighlight)
    }

    pub fn search_passes(&self) -> usize {
        self.search_passes
    }

    fn write_pass<R>(&mut self, pass: impl FnOnce(&mut Self) -> R) -> R {
        let external = self.document.take_mutations();
        self.deferred.extend(external);

        let result = pass(self);

        let own = self.document.take_mutations();
        if !own.is_empty() {
            trace!(records = own.len(), "discarded records from engine writes");
        }
        result
    }

    fn search_pass(&mut self, raw: &str) {
        self.clear_pass();

        let terms = TermList::parse(raw);
        if terms.is_empty() {
            debug!("search input held no terms");
            return;
        }

        let mut entries = Vec::with_capacity(terms.len());
        for (index, term) in terms.iter().enumerate() {
            let color = color_for_index(index);
            let matches = self.highlight_term(term, color);
            entries.push(SummaryEntry {
                term: term.as_str().to_string(),
                color,
                matches,
            });
        }

        let summary = ResultsSummary { entries };
        info!(
            terms = terms.len(),
            matches = summary.total_matches(),
            "highlighted search terms"
        );
        self.current_terms = terms;
        self.summary = Some(summary);
        self.search_passes += 1;
    }

    fn highlight_term(&mut self, term: &Term, color: Color) -> usize {
        let body = self.document.body();
        let candidates: Vec<(NodeId, MatchSet)> = self
            .document
            .find_text_nodes(body)
            .into_iter()
            .filter(|node| !self.is_excluded(*node))
            .filter_map(|node| {
                let spans = scan_text(self.document.text_of(node)?, term, color);
                (!spans.is_empty()).then_some((node, spans))
            })
            .collect();

        let mut created = 0;
        for (node, spans) in candidates {
            if !self.document.is_connected(node) {
                debug!(?node, "text node left the document before rewrite");
                continue;
            }
            match self
                .document
                .split_text_node(node, &spans, &self.config.marker_class)
            {
                Ok(_) => created += spans.len(),
                Err(error) => warn!(%error, "skipping text node rewrite"),
            }
        }

        debug!(term = term.as_str(), created, "term pass finished");
        created
    }

    fn clear_pass(&mut self) {
        let marked = self.document.query_marked(&self.config.marker_class);
        let mut unwrapped = 0;

        for span in marked {
            // Nested spans leave with their enclosing span.
            if !self.document.is_connected(span) {
                continue;
            }
            let text = self.document.text_content(span);
            match self.document.replace_node(span, vec![Fragment::Text(text)]) {
                Ok(_) => unwrapped += 1,
                Err(error) => warn!(%error, "skipping span restoration"),
            }
        }

        if unwrapped > 0 {
            let body = self.document.body();
            let merged = self.document.merge_adjacent_text(body);
            debug!(unwrapped, merged, "highlights cleared");
        }

        self.current_terms = TermList::default();
        self.summary = None;
    }

    fn is_excluded(&self, node: NodeId) -> bool {
        let body = self.document.body();
        let mut current = self.document.parent(node);
        while let Some(id) = current {
            if let Some(tag) = self.document.tag_name(id) {
                if self.config.is_excluded_tag(tag) {
                    return true;
                }
            }
            if id == body {
                break;
            }
            current = self.document.parent(id);
        }
        false
    }

    fn run_task(&mut self, task: Task) {
        match task {
            Task::FinishHide => {
                if self.overlay.finish_hide() {
                    info!("overlay hidden");
                }
            }
            Task::Rehighlight(cause) => {
                if !self.settings.auto_highlight_ready() {
                    debug!(?cause, "auto-highlight disarmed; dropping re-highlight");
                    return;
                }
                info!(
                    ?cause,
                    terms = self.settings.default_terms.len(),
                    "re-highlighting default terms"
                );
                let raw = self.settings.default_term_list().joined();
                self.perform_search(&raw);
            }
        }
    }

    fn schedule_rehighlight(&mut self, cause: RehighlightCause, delay: Duration) {
        let task = Task::Rehighlight(cause);
        if self.timers.schedule(TimerSlot::Rehighlight, delay, task) {
            debug!(?cause, "coalesced pending re-highlight");
        }
    }

    fn schedule_finish_hide(&mut self) {
        let delay = self.config.hide_transition_delay();
        self.timers.schedule(TimerSlot::FinishHide, delay, Task::FinishHide);
        info!("overlay hiding");
    }

    fn persist_settings(&mut self) {
        if let Err(error) = self.store.save(&self.settings) {
            warn!(%error, "failed to persist settings");
        }
    }
}
