//! Telegram update handlers.
//!
//! Each handler is a small adapter that:
//! - identifies the session the update belongs to
//! - checks access
//! - hands the update to `ylb-core` (dialog engine, quick shortener)
//!
//! Handler failures never reach the dispatcher: they are logged and reported
//! to the admin chat instead.

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{CallbackQuery, ChosenInlineResult, InlineQuery, Message},
};
use tracing::error;

use ylb_core::{
    domain::{ChatId, SessionKey, UserId},
    formatting::escape_html,
    utils::truncate_text,
};

use crate::router::AppState;

mod callback;
mod commands;
mod inline;
mod text;

pub async fn handle_callback(q: CallbackQuery, state: Arc<AppState>) -> ResponseResult<()> {
    if let Err(e) = callback::handle_callback(q, state.clone()).await {
        report_error(&state, "callback query", &e).await;
    }
    Ok(())
}

pub async fn handle_inline_query(
    bot: Bot,
    q: InlineQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    if let Err(e) = inline::handle_inline_query(bot, q, state.clone()).await {
        report_error(&state, "inline query", &e).await;
    }
    Ok(())
}

pub async fn handle_chosen_inline_result(
    r: ChosenInlineResult,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    if let Err(e) = inline::handle_chosen_result(r, state.clone()).await {
        report_error(&state, "chosen inline result", &e).await;
    }
    Ok(())
}

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    // Results of our own inline mode land in chats as ordinary messages.
    if msg
        .via_bot
        .as_ref()
        .is_some_and(|b| b.id == state.bot_id)
    {
        return Ok(());
    }

    let Some(key) = message_session(&msg) else {
        return Ok(());
    };

    let result = match msg.text() {
        Some(text) if text.starts_with('/') => {
            commands::handle_command(&msg, key, state.clone()).await
        }
        _ => text::handle_message(&msg, key, state.clone()).await,
    };

    if let Err(e) = result {
        report_error(&state, "message", &e).await;
    }
    Ok(())
}

fn user_id(user: &teloxide::types::User) -> UserId {
    UserId(user.id.0 as i64)
}

/// Messages belong to the (chat, sender) session. Channel posts have no sender.
fn message_session(msg: &Message) -> Option<SessionKey> {
    let from = msg.from()?;
    Some(SessionKey::new(ChatId(msg.chat.id.0), user_id(from)))
}

/// Log the failure and tell the admin about it, best-effort.
async fn report_error(state: &AppState, context: &str, err: &anyhow::Error) {
    error!(context, error = %err, "update handling failed");

    let text = format!(
        "An exception was raised while handling a {context}\n<pre>{}</pre>",
        escape_html(&truncate_text(&format!("{err:#}"), 3500))
    );
    if let Err(e) = state
        .messenger
        .send_html(ChatId(state.cfg.admin_user_id), &text)
        .await
    {
        error!(error = %e, "failed to notify admin");
    }
}
