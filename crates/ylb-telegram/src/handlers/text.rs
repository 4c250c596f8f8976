use std::sync::Arc;

use teloxide::types::{Message, MessageEntityKind};
use tracing::debug;

use ylb_core::{
    dialog::{DialogInput, ForwardedUser},
    domain::SessionKey,
    utils::{parse_url_with_keyword, LinkEntity},
};

use crate::router::AppState;

use super::user_id;

/// Reduce a message to what a dialog step looks at.
fn dialog_input(msg: &Message) -> DialogInput {
    if msg.forward_date().is_some() {
        return DialogInput::Forwarded {
            from: msg.forward_from_user().map(|u| ForwardedUser {
                id: user_id(u),
                full_name: u.full_name(),
            }),
            text: msg.text().map(str::to_string),
        };
    }
    match msg.text() {
        Some(text) => DialogInput::Text(text.to_string()),
        None => DialogInput::Other,
    }
}

/// URL and text-link entities, in order of appearance.
fn link_entities(msg: &Message) -> Vec<LinkEntity> {
    let Some(entities) = msg.parse_entities() else {
        return Vec::new();
    };
    entities
        .iter()
        .filter_map(|e| match e.kind() {
            MessageEntityKind::Url => Some(LinkEntity::Url(e.text().to_string())),
            MessageEntityKind::TextLink { url } => Some(LinkEntity::TextLink {
                text: e.text().to_string(),
                url: url.to_string(),
            }),
            _ => None,
        })
        .collect()
}

pub async fn handle_message(
    msg: &Message,
    key: SessionKey,
    state: Arc<AppState>,
) -> anyhow::Result<()> {
    let core = &state.core;

    if core.step_dialog(key, dialog_input(msg)).await?.is_some() {
        return Ok(());
    }

    // Outside of dialogs only plain text from permitted users is handled.
    let Some(text) = msg.text() else {
        return Ok(());
    };
    if !core.access().is_permitted(Some(key.user_id)).await {
        debug!(session = %key, "ignoring message from unauthorized user");
        return Ok(());
    }

    let entities = link_entities(msg);
    if let Some((url, keyword)) = parse_url_with_keyword(text, &entities) {
        let reply = core.shortener().shorten_with_keyword(&url, &keyword).await?;
        state.messenger.send_html(key.chat_id, &reply).await?;
        return Ok(());
    }

    if let Some(reply) = core.shortener().shorten_links(&entities).await? {
        state.messenger.send_html(key.chat_id, &reply).await?;
    }
    Ok(())
}
