use std::sync::Arc;

use teloxide::types::CallbackQuery;
use tracing::debug;

use ylb_core::{
    dialog::engine::{PromptCancel, CANCEL_CALLBACK_DATA},
    domain::{ChatId, MessageId, MessageRef, SessionKey},
    formatting::{PROMPT_EXPIRED, PROMPT_NOT_YOURS},
};

use crate::router::AppState;

use super::user_id;

pub async fn handle_callback(q: CallbackQuery, state: Arc<AppState>) -> anyhow::Result<()> {
    let cb_id = q.id.clone();
    let data = q.data.clone().unwrap_or_default();

    // Always answer the callback query, even when there is nothing to do.
    let Some(message) = q.message.as_ref() else {
        state.messenger.answer_callback_query(&cb_id, None).await?;
        return Ok(());
    };
    if data != CANCEL_CALLBACK_DATA {
        debug!(data = %data, "unknown callback data");
        state.messenger.answer_callback_query(&cb_id, None).await?;
        return Ok(());
    }

    let key = SessionKey::new(ChatId(message.chat.id.0), user_id(&q.from));
    let prompt = MessageRef {
        chat_id: key.chat_id,
        message_id: MessageId(message.id.0),
    };

    match state.core.cancel_from_prompt(key, prompt).await? {
        PromptCancel::Cancelled => {
            state.messenger.answer_callback_query(&cb_id, None).await?;
        }
        PromptCancel::Stale => {
            state
                .messenger
                .answer_callback_query(&cb_id, Some(PROMPT_EXPIRED))
                .await?;
        }
        PromptCancel::Foreign => {
            state
                .messenger
                .answer_callback_query(&cb_id, Some(PROMPT_NOT_YOURS))
                .await?;
        }
    }
    Ok(())
}
