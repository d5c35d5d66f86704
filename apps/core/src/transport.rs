use tracing::{debug, warn};

use crate::contract::{Command, CommandResponse, MessageSender};
use crate::document::DocumentHost;
use crate::engine::HighlightEngine;
use crate::settings::SettingsStore;

/// Dispatches one command. Commands from anyone but the controller are
/// dropped without a response.
pub fn handle_command<D, S>(
    engine: &mut HighlightEngine<D, S>,
    sender: &MessageSender,
    command: Command,
) -> Option<CommandResponse>
where
    D: DocumentHost,
    S: SettingsStore,
{
    if !engine.is_trusted_sender(sender.id.as_deref()) {
        warn!(
            sender = sender.id.as_deref().unwrap_or("<none>"),
            action = command.action(),
            "ignoring command from untrusted sender"
        );
        return None;
    }

    debug!(action = command.action(), "handling command");
    let response = match command {
        Command::ToggleOverlay => {
            engine.toggle_overlay();
            CommandResponse::ok()
        }
        Command::PerformSearch { terms } => {
            engine.perform_search(&terms);
            CommandResponse::ok()
        }
        Command::ClearHighlights => {
            engine.clear_highlights();
            CommandResponse::ok()
        }
        Command::ToggleAutoHighlight => {
            let enabled = engine.toggle_auto_highlight();
            CommandResponse::ok().with_auto_highlight_mode(enabled)
        }
        Command::SetDefaultTerms { terms } => {
            engine.set_default_terms(&terms);
            CommandResponse::ok()
        }
        Command::ReHighlight => {
            engine.re_highlight();
            CommandResponse::ok()
        }
    };
    Some(response)
}

pub fn handle_json<D, S>(
    engine: &mut HighlightEngine<D, S>,
    sender: &MessageSender,
    payload: &str,
) -> Option<String>
where
    D: DocumentHost,
    S: SettingsStore,
{
    if !engine.is_trusted_sender(sender.id.as_deref()) {
        warn!("ignoring payload from untrusted sender");
        return None;
    }

    let response = match serde_json::from_str::<Command>(payload) {
        Ok(command) => handle_command(engine, sender, command)?,
        Err(error) => {
            debug!(%error, "rejecting malformed command");
            CommandResponse::failed(format!("invalid command: {error}"))
        }
    };

    match serde_json::to_string(&response) {
        Ok(encoded) => Some(encoded),
        Err(error) => {
            warn!(%error, "failed to encode command response");
            None
        }
    }
}
