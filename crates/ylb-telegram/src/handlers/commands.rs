use std::sync::Arc;

use teloxide::types::Message;
use tracing::debug;

use ylb_core::{
    dialog::{DialogInput, DialogKind},
    domain::SessionKey,
    errors::Error,
    formatting::{info_text, HOMEPAGE, NOTHING_TO_CANCEL, USER_GUIDE, YOURLS_HOMEPAGE},
    messaging::types::{InlineButton, InlineKeyboard},
    shorten::start_parameter_explanation,
};

use crate::router::AppState;

use super::user_id;

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

fn info_keyboard(instance_url: &str) -> InlineKeyboard {
    InlineKeyboard::new(vec![
        InlineButton::url("User Guide 🤖", USER_GUIDE),
        InlineButton::url("Official YOURLS Homepage", YOURLS_HOMEPAGE),
        InlineButton::url("This YOURLS instance", instance_url),
        InlineButton::url("About this bot", HOMEPAGE),
    ])
}

pub async fn handle_command(
    msg: &Message,
    key: SessionKey,
    state: Arc<AppState>,
) -> anyhow::Result<()> {
    let (cmd, args) = parse_command(msg.text().unwrap_or(""));
    let core = &state.core;
    let permitted = core.access().is_permitted(Some(key.user_id)).await;

    if cmd == "cancel" {
        if !permitted {
            return Ok(());
        }
        if !core.cancel_dialog(key).await? {
            state
                .messenger
                .send_html(key.chat_id, NOTHING_TO_CANCEL)
                .await?;
        }
        return Ok(());
    }

    // Any other command while a flow waits for input ends that flow.
    if core.step_dialog(key, DialogInput::Other).await?.is_some() {
        return Ok(());
    }

    match cmd.as_str() {
        "start" if permitted && !args.is_empty() => {
            state
                .messenger
                .send_html(key.chat_id, &start_parameter_explanation(&args))
                .await?;
        }
        "start" | "help" | "info" => {
            let text = info_text(&state.bot_name, core.gateway().base_url());
            state
                .messenger
                .send_with_keyboard(key.chat_id, &text, info_keyboard(core.gateway().base_url()))
                .await?;
        }
        other => {
            let Some(kind) = DialogKind::from_command(other) else {
                debug!(command = other, "unknown command");
                return Ok(());
            };
            start_dialog(msg, key, kind, &state).await?;
        }
    }
    Ok(())
}

async fn start_dialog(
    msg: &Message,
    key: SessionKey,
    kind: DialogKind,
    state: &AppState,
) -> anyhow::Result<()> {
    let sender = msg.from().map(user_id);
    if !state.core.access().may_start(sender, kind).await {
        debug!(session = %key, kind = %kind, "not permitted to start dialog");
        return Ok(());
    }

    // The selection arrives as a chosen inline result, which carries no chat.
    // Only the private chat can be matched back to the session.
    if kind == DialogKind::KickUser && !msg.chat.is_private() {
        state
            .messenger
            .send_html(
                key.chat_id,
                "Please use /kick_user in a private chat with me.",
            )
            .await?;
        return Ok(());
    }

    match state.core.start_dialog(key, kind).await {
        Ok(()) => Ok(()),
        Err(Error::Conflict) => {
            state
                .messenger
                .send_html(
                    key.chat_id,
                    "Please finish the current operation or /cancel it first.",
                )
                .await?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
