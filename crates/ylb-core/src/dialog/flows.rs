use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    access::AccessRegistry,
    cache::ListingCache,
    dialog::{Dialog, DialogInput, DialogKind, EditStep},
    domain::UserId,
    formatting::{
        escape_html, keyword_missing, DELETE_FAILURE, REMOTE_FAILURE, SHORTENER_UNREACHABLE,
    },
    messaging::types::{InlineButton, InlineKeyboard},
    ports::ShortenerGateway,
    utils::{extract_keyword, sanitize_protocol},
    Error, Result,
};

pub const CANCEL_CALLBACK_DATA: &str = "dialog:cancel";

const ASK_KEYWORD_TO_CHANGE: &str = "Which keyword do you want to change?";
const ASK_KEYWORD_TO_RETARGET: &str = "Which short URL/keyword needs updating?";
const ASK_NEW_KEYWORD: &str = "Please send the new keyword.";
const ASK_NEW_URL: &str = "Please send the new long URL.";
const ASK_KEYWORD_TO_DELETE: &str = "Which short URL/keyword do you want to delete?";
const ASK_USER_TO_ADD: &str =
    "Which user do you want to add? You may forward a message or give me their Telegram ID.";
const ASK_USER_ID_DIRECTLY: &str =
    "The user apparently disallowed to include their contact details in forwarded messages, so \
     I can't read their ID from that message. Please send me the ID directly.";
const ASK_USER_TO_KICK: &str =
    "Which user do you want to kick? Click the button below to select the user.";

/// Collaborators the step handlers act through.
pub(crate) struct FlowContext {
    pub gateway: Arc<dyn ShortenerGateway>,
    pub cache: Arc<ListingCache>,
    pub access: Arc<AccessRegistry>,
}

/// What a step handler decided.
#[derive(Debug)]
pub(crate) enum Transition {
    /// Show `text` as the new prompt and wait in `next` (which may be the same state).
    Prompt { next: Dialog, text: String },
    Done { reply: String },
    Unmatched,
}

impl Transition {
    fn reprompt(dialog: &Dialog, text: impl Into<String>) -> Self {
        Transition::Prompt {
            next: dialog.clone(),
            text: text.into(),
        }
    }
}

pub(crate) fn opening_prompt(kind: DialogKind) -> &'static str {
    match kind {
        DialogKind::ChangeKeyword => ASK_KEYWORD_TO_CHANGE,
        DialogKind::ChangeUrl => ASK_KEYWORD_TO_RETARGET,
        DialogKind::Delete => ASK_KEYWORD_TO_DELETE,
        DialogKind::AddUser => ASK_USER_TO_ADD,
        DialogKind::KickUser => ASK_USER_TO_KICK,
    }
}

/// Controls attached to every prompt of `dialog`.
pub(crate) fn prompt_keyboard(dialog: &Dialog) -> InlineKeyboard {
    let cancel = InlineButton::callback("Cancel", CANCEL_CALLBACK_DATA);
    match dialog {
        Dialog::KickUser => InlineKeyboard::new(vec![
            InlineButton::switch_inline_current_chat("Click Me 👆"),
            cancel,
        ]),
        _ => InlineKeyboard::single(cancel),
    }
}

pub(crate) async fn advance(
    ctx: &FlowContext,
    dialog: &Dialog,
    input: DialogInput,
) -> Result<Transition> {
    match dialog {
        Dialog::ChangeKeyword(EditStep::AwaitingSourceKeyword)
        | Dialog::ChangeUrl(EditStep::AwaitingSourceKeyword) => {
            source_keyword(ctx, dialog, &input).await
        }
        Dialog::ChangeKeyword(EditStep::AwaitingReplacement { source }) => {
            let Some(text) = input.text() else {
                return Ok(Transition::Unmatched);
            };
            Ok(rename(ctx, source, &extract_keyword(text)).await)
        }
        Dialog::ChangeUrl(EditStep::AwaitingReplacement { source }) => {
            let Some(text) = input.text() else {
                return Ok(Transition::Unmatched);
            };
            Ok(retarget(ctx, source, &sanitize_protocol(text)).await)
        }
        Dialog::Delete => {
            let Some(text) = input.text() else {
                return Ok(Transition::Unmatched);
            };
            Ok(delete(ctx, dialog, &extract_keyword(text)).await)
        }
        Dialog::AddUser => add_user(ctx, dialog, input).await,
        Dialog::KickUser => kick_user(ctx, input).await,
    }
}

async fn source_keyword(
    ctx: &FlowContext,
    dialog: &Dialog,
    input: &DialogInput,
) -> Result<Transition> {
    let Some(text) = input.text() else {
        return Ok(Transition::Unmatched);
    };
    let keyword = extract_keyword(text);

    match keyword_exists(ctx, &keyword).await {
        Ok(true) => {}
        Ok(false) => return Ok(Transition::reprompt(dialog, keyword_missing(&keyword))),
        Err(e) => {
            warn!(keyword = %keyword, error = %e, "existence check failed");
            return Ok(Transition::reprompt(dialog, SHORTENER_UNREACHABLE));
        }
    }

    let step = EditStep::AwaitingReplacement { source: keyword };
    Ok(match dialog.kind() {
        DialogKind::ChangeUrl => Transition::Prompt {
            next: Dialog::ChangeUrl(step),
            text: ASK_NEW_URL.to_string(),
        },
        _ => Transition::Prompt {
            next: Dialog::ChangeKeyword(step),
            text: ASK_NEW_KEYWORD.to_string(),
        },
    })
}

/// Cached listing first; a miss is confirmed against the shortener, so a link
/// created since the last refresh is still found.
async fn keyword_exists(ctx: &FlowContext, keyword: &str) -> Result<bool> {
    match ctx.cache.exists(keyword).await {
        Ok(Some(_)) => return Ok(true),
        Ok(None) => {}
        Err(e) => debug!(error = %e, "listing unavailable; asking the shortener directly"),
    }
    match ctx.gateway.expand(keyword).await {
        Ok(_) => Ok(true),
        Err(Error::NotFound(_)) => Ok(false),
        Err(e) => Err(e),
    }
}

async fn rename(ctx: &FlowContext, source: &str, new_keyword: &str) -> Transition {
    match ctx.gateway.rename(source, new_keyword).await {
        Ok(()) => Transition::Done {
            reply: format!(
                "All done. The new short URL is: {}/{}.",
                ctx.gateway.base_url(),
                escape_html(new_keyword)
            ),
        },
        Err(e) => {
            warn!(source, new_keyword, error = %e, "rename failed");
            Transition::Done {
                reply: REMOTE_FAILURE.to_string(),
            }
        }
    }
}

async fn retarget(ctx: &FlowContext, keyword: &str, url: &str) -> Transition {
    match ctx.gateway.retarget(keyword, url).await {
        Ok(()) => Transition::Done {
            reply: "All done.".to_string(),
        },
        Err(e) => {
            warn!(keyword, url, error = %e, "retarget failed");
            Transition::Done {
                reply: REMOTE_FAILURE.to_string(),
            }
        }
    }
}

async fn delete(ctx: &FlowContext, dialog: &Dialog, keyword: &str) -> Transition {
    match ctx.gateway.remove(keyword).await {
        Ok(()) => Transition::Done {
            reply: "Deletion successful.".to_string(),
        },
        Err(Error::NotFound(_)) => Transition::reprompt(dialog, keyword_missing(keyword)),
        Err(e) => {
            warn!(keyword, error = %e, "delete failed");
            Transition::Done {
                reply: DELETE_FAILURE.to_string(),
            }
        }
    }
}

async fn add_user(ctx: &FlowContext, dialog: &Dialog, input: DialogInput) -> Result<Transition> {
    match input {
        DialogInput::Forwarded {
            from: Some(user), ..
        } => {
            ctx.access.add_user(user.id).await?;
            Ok(Transition::Done {
                reply: format!(
                    "User {} was successfully added.",
                    escape_html(&user.full_name)
                ),
            })
        }
        DialogInput::Forwarded { from: None, .. } => {
            Ok(Transition::reprompt(dialog, ASK_USER_ID_DIRECTLY))
        }
        DialogInput::Text(text) => match text.trim().parse::<i64>() {
            Ok(id) => {
                ctx.access.add_user(UserId(id)).await?;
                Ok(Transition::Done {
                    reply: "User was successfully added.".to_string(),
                })
            }
            Err(_) => Ok(Transition::Unmatched),
        },
        DialogInput::Selection(_) | DialogInput::Other => Ok(Transition::Unmatched),
    }
}

async fn kick_user(ctx: &FlowContext, input: DialogInput) -> Result<Transition> {
    let DialogInput::Selection(result_id) = input else {
        return Ok(Transition::Unmatched);
    };
    let Ok(id) = result_id.trim().parse::<i64>() else {
        return Ok(Transition::Unmatched);
    };

    ctx.access.kick_user(UserId(id)).await?;
    Ok(Transition::Done {
        reply: "The user was kicked and can no longer use this bot.".to_string(),
    })
}
