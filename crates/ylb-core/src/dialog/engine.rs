use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    access::AccessRegistry,
    cache::ListingCache,
    dialog::{
        flows::{self, FlowContext, Transition},
        CancelReason, Dialog, DialogInput, DialogKind, Outcome,
    },
    domain::{MessageRef, SessionKey},
    formatting::OPERATION_ABORTED,
    messaging::port::MessagingPort,
    ports::ShortenerGateway,
    session::{SessionGuard, Sessions},
    Error, Result,
};

pub use crate::dialog::flows::CANCEL_CALLBACK_DATA;

/// Result of a cancel request coming from a prompt's cancel control.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PromptCancel {
    Cancelled,
    /// The pressed prompt is not the live one; its control was removed.
    Stale,
    /// Pressed in a shared chat on a prompt this session does not own. The
    /// prompt may be another member's live one, so it is left untouched.
    Foreign,
}

/// Drives every guided flow of every session.
///
/// All work for one session happens while holding that session's lock, so a
/// step never observes a half-applied previous step.
pub struct DialogEngine {
    sessions: Arc<Sessions>,
    messenger: Arc<dyn MessagingPort>,
    flows: FlowContext,
}

impl DialogEngine {
    pub fn new(
        sessions: Arc<Sessions>,
        messenger: Arc<dyn MessagingPort>,
        gateway: Arc<dyn ShortenerGateway>,
        cache: Arc<ListingCache>,
        access: Arc<AccessRegistry>,
    ) -> Self {
        Self {
            sessions,
            messenger,
            flows: FlowContext {
                gateway,
                cache,
                access,
            },
        }
    }

    /// The running dialog of a session, if any.
    pub async fn active(&self, key: SessionKey) -> Result<Option<Dialog>> {
        Ok(self.sessions.peek(key).await?.active_dialog)
    }

    /// Start a flow and send its first prompt.
    ///
    /// Fails with [`Error::Conflict`] while another dialog of the same session runs.
    pub async fn start(&self, key: SessionKey, kind: DialogKind) -> Result<()> {
        let mut session = self.sessions.open(key).await?;
        if let Some(active) = &session.active_dialog {
            debug!(session = %key, active = %active.kind(), requested = %kind, "dialog already running");
            return Err(Error::Conflict);
        }

        self.retract_prompt(&mut session).await;
        let dialog = Dialog::new(kind);
        info!(session = %key, kind = %kind, "dialog started");
        self.enter(&mut session, dialog, flows::opening_prompt(kind))
            .await
    }

    /// Feed one input to the running dialog. `None` when no dialog runs.
    pub async fn step(&self, key: SessionKey, input: DialogInput) -> Result<Option<Outcome>> {
        let mut session = self.sessions.open(key).await?;
        let Some(dialog) = session.active_dialog.clone() else {
            return Ok(None);
        };

        self.retract_prompt(&mut session).await;

        // The prompt is already retracted; a failed step ends the dialog.
        let transition = match flows::advance(&self.flows, &dialog, input).await {
            Ok(t) => t,
            Err(e) => {
                warn!(session = %key, kind = %dialog.kind(), error = %e, "dialog step failed; aborting");
                if let Err(abort_err) = self.abort(&mut session).await {
                    warn!(session = %key, error = %abort_err, "failed to abort dialog");
                }
                return Err(e);
            }
        };

        let outcome = match transition {
            Transition::Prompt { next, text } => {
                let step = next.step();
                debug!(session = %key, kind = %next.kind(), step = %step, "dialog step");
                self.enter(&mut session, next, &text).await?;
                Outcome::Continue(step)
            }
            Transition::Done { reply } => {
                session.active_dialog = None;
                session.save().await?;
                info!(session = %key, kind = %dialog.kind(), "dialog completed");
                self.messenger.send_html(key.chat_id, &reply).await?;
                Outcome::Completed { reply }
            }
            Transition::Unmatched => {
                session.active_dialog = None;
                session.save().await?;
                info!(session = %key, kind = %dialog.kind(), step = %dialog.step(), "unexpected input; dialog aborted");
                self.messenger
                    .send_html(key.chat_id, OPERATION_ABORTED)
                    .await?;
                Outcome::Cancelled(CancelReason::Unmatched)
            }
        };
        Ok(Some(outcome))
    }

    /// Explicit cancel (e.g. `/cancel`). Returns whether a dialog was running.
    pub async fn cancel(&self, key: SessionKey) -> Result<bool> {
        let mut session = self.sessions.open(key).await?;
        if session.active_dialog.is_none() {
            return Ok(false);
        }
        self.abort(&mut session).await?;
        Ok(true)
    }

    /// Cancel pressed on `prompt`. Only the live prompt of a running dialog
    /// cancels. Any other press in a private chat just loses its control; in a
    /// shared chat the press is ignored.
    pub async fn cancel_from_prompt(
        &self,
        key: SessionKey,
        prompt: MessageRef,
    ) -> Result<PromptCancel> {
        let mut session = self.sessions.open(key).await?;
        if session.active_dialog.is_none() || session.pending_prompt != Some(prompt) {
            if key != SessionKey::private(key.user_id) || prompt.chat_id != key.chat_id {
                debug!(session = %key, message = prompt.message_id.0, "cancel pressed on a foreign prompt");
                return Ok(PromptCancel::Foreign);
            }
            debug!(session = %key, message = prompt.message_id.0, "stale cancel control");
            if let Err(e) = self.messenger.clear_keyboard(prompt).await {
                debug!(error = %e, "failed to clear stale cancel control");
            }
            return Ok(PromptCancel::Stale);
        }
        self.abort(&mut session).await?;
        Ok(PromptCancel::Cancelled)
    }

    async fn abort(&self, session: &mut SessionGuard) -> Result<()> {
        let key = session.key();
        let kind = session.active_dialog.take().map(|d| d.kind());
        let prompt = session.pending_prompt.take();
        session.save().await?;
        info!(session = %key, kind = ?kind, "dialog cancelled");

        let acknowledged = match prompt {
            Some(prompt) => match self.messenger.edit_html(prompt, OPERATION_ABORTED).await {
                Ok(()) => true,
                Err(e) => {
                    debug!(error = %e, "could not edit prompt; sending acknowledgement instead");
                    false
                }
            },
            None => false,
        };
        if !acknowledged {
            self.messenger
                .send_html(key.chat_id, OPERATION_ABORTED)
                .await?;
        }
        Ok(())
    }

    /// Remove the cancel control of the recorded prompt. Best-effort.
    async fn retract_prompt(&self, session: &mut SessionGuard) {
        let Some(prompt) = session.pending_prompt.take() else {
            return;
        };
        if let Err(e) = self.messenger.clear_keyboard(prompt).await {
            debug!(error = %e, message = prompt.message_id.0, "failed to retract prompt controls");
        }
    }

    /// Move into `dialog`, send its prompt and record it as the live one.
    async fn enter(&self, session: &mut SessionGuard, dialog: Dialog, text: &str) -> Result<()> {
        let keyboard = flows::prompt_keyboard(&dialog);
        let sent = self
            .messenger
            .send_with_keyboard(session.key().chat_id, text, keyboard)
            .await;

        session.active_dialog = Some(dialog);
        session.pending_prompt = sent.as_ref().ok().copied();
        session.save().await?;
        sent.map(|_| ())
    }
}
