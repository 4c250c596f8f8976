//! Guided multi-step flows.
//!
//! A [`Dialog`] is a tagged value: the variant names the flow, the step inside
//! it names where the flow currently is, and any data a later step needs is
//! carried by the step itself. The [`engine::DialogEngine`] owns the uniform
//! behaviour (cancellation, prompt retraction, fallback abort); `flows` owns
//! what each step does with its input.

pub mod engine;
mod flows;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::UserId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DialogKind {
    ChangeKeyword,
    ChangeUrl,
    Delete,
    AddUser,
    KickUser,
}

impl DialogKind {
    pub const ALL: [DialogKind; 5] = [
        DialogKind::ChangeKeyword,
        DialogKind::ChangeUrl,
        DialogKind::Delete,
        DialogKind::AddUser,
        DialogKind::KickUser,
    ];

    /// Entry command, without the leading slash.
    pub fn command(self) -> &'static str {
        match self {
            DialogKind::ChangeKeyword => "change_keyword",
            DialogKind::ChangeUrl => "change_url",
            DialogKind::Delete => "delete_url",
            DialogKind::AddUser => "add_user",
            DialogKind::KickUser => "kick_user",
        }
    }

    pub fn from_command(cmd: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.command() == cmd)
    }

    pub fn description(self) -> &'static str {
        match self {
            DialogKind::ChangeKeyword => "Change the keyword of a short URL",
            DialogKind::ChangeUrl => "Change the long URL of a short URL",
            DialogKind::Delete => "Delete a short URL",
            DialogKind::AddUser => "Allow a new user to use this bot",
            DialogKind::KickUser => "Revoke a user's access",
        }
    }

    pub fn admin_only(self) -> bool {
        matches!(self, DialogKind::AddUser | DialogKind::KickUser)
    }

    fn as_str(self) -> &'static str {
        match self {
            DialogKind::ChangeKeyword => "change-keyword",
            DialogKind::ChangeUrl => "change-url",
            DialogKind::Delete => "delete",
            DialogKind::AddUser => "add-user",
            DialogKind::KickUser => "kick-user",
        }
    }
}

impl fmt::Display for DialogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Two-step flows: first the keyword to act on, then its replacement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum EditStep {
    AwaitingSourceKeyword,
    AwaitingReplacement { source: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "step", rename_all = "kebab-case")]
pub enum Dialog {
    ChangeKeyword(EditStep),
    ChangeUrl(EditStep),
    Delete,
    AddUser,
    KickUser,
}

impl Dialog {
    /// The flow in its first state.
    pub fn new(kind: DialogKind) -> Self {
        match kind {
            DialogKind::ChangeKeyword => Dialog::ChangeKeyword(EditStep::AwaitingSourceKeyword),
            DialogKind::ChangeUrl => Dialog::ChangeUrl(EditStep::AwaitingSourceKeyword),
            DialogKind::Delete => Dialog::Delete,
            DialogKind::AddUser => Dialog::AddUser,
            DialogKind::KickUser => Dialog::KickUser,
        }
    }

    pub fn kind(&self) -> DialogKind {
        match self {
            Dialog::ChangeKeyword(_) => DialogKind::ChangeKeyword,
            Dialog::ChangeUrl(_) => DialogKind::ChangeUrl,
            Dialog::Delete => DialogKind::Delete,
            Dialog::AddUser => DialogKind::AddUser,
            Dialog::KickUser => DialogKind::KickUser,
        }
    }

    pub fn step(&self) -> StepName {
        match self {
            Dialog::ChangeKeyword(EditStep::AwaitingSourceKeyword)
            | Dialog::ChangeUrl(EditStep::AwaitingSourceKeyword) => {
                StepName::AwaitingSourceKeyword
            }
            Dialog::ChangeKeyword(EditStep::AwaitingReplacement { .. }) => {
                StepName::AwaitingNewKeyword
            }
            Dialog::ChangeUrl(EditStep::AwaitingReplacement { .. }) => StepName::AwaitingNewUrl,
            Dialog::Delete => StepName::AwaitingKeyword,
            Dialog::AddUser => StepName::AwaitingIdentity,
            Dialog::KickUser => StepName::AwaitingSelection,
        }
    }

    /// Whether this state is answered by a chosen inline result rather than a message.
    pub fn awaits_selection(&self) -> bool {
        matches!(self, Dialog::KickUser)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepName {
    AwaitingSourceKeyword,
    AwaitingNewKeyword,
    AwaitingNewUrl,
    AwaitingKeyword,
    AwaitingIdentity,
    AwaitingSelection,
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StepName::AwaitingSourceKeyword => "awaiting-source-keyword",
            StepName::AwaitingNewKeyword => "awaiting-new-keyword",
            StepName::AwaitingNewUrl => "awaiting-new-url",
            StepName::AwaitingKeyword => "awaiting-keyword",
            StepName::AwaitingIdentity => "awaiting-identity",
            StepName::AwaitingSelection => "awaiting-selection",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForwardedUser {
    pub id: UserId,
    pub full_name: String,
}

/// One inbound event, already reduced to what the flows care about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DialogInput {
    /// A plain (non-command) text message.
    Text(String),
    /// A forwarded message. `from` is `None` when the sender hid their identity.
    Forwarded {
        from: Option<ForwardedUser>,
        text: Option<String>,
    },
    /// Id of a chosen inline result.
    Selection(String),
    /// Anything else: stickers, photos, commands, ...
    Other,
}

impl DialogInput {
    fn text(&self) -> Option<&str> {
        match self {
            DialogInput::Text(t) => Some(t),
            DialogInput::Forwarded { text, .. } => text.as_deref(),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CancelReason {
    /// Cancel control or `/cancel`.
    Requested,
    /// Input of the wrong shape for the current step.
    Unmatched,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Continue(StepName),
    Completed { reply: String },
    Cancelled(CancelReason),
}
