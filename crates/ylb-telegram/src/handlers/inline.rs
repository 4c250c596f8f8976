use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{
        ChosenInlineResult, InlineQuery, InlineQueryResult, InlineQueryResultArticle,
        InputMessageContent, InputMessageContentText,
    },
};
use tracing::{debug, warn};

use ylb_core::{
    dialog::DialogInput,
    domain::{SessionKey, UserId},
    shorten::{InlineAnswer, EXISTING_LINK_RESULT_ID},
};

use crate::router::AppState;

use super::user_id;

/// Telegram accepts at most 50 results per answer.
const PAGE_SIZE: usize = 50;

fn article(id: &str, title: &str, content: &str) -> InlineQueryResult {
    InlineQueryResult::Article(InlineQueryResultArticle::new(
        id,
        title,
        InputMessageContent::Text(InputMessageContentText::new(content)),
    ))
}

/// "First Last (@username)", leaving out whatever is missing.
fn display_name(first: Option<&str>, last: Option<&str>, username: Option<&str>) -> String {
    let mut name = first.unwrap_or_default().to_string();
    if let Some(last) = last {
        if !name.is_empty() {
            name.push(' ');
        }
        name.push_str(last);
    }
    if let Some(username) = username {
        if !name.is_empty() {
            name.push(' ');
        }
        name.push_str(&format!("(@{username})"));
    }
    name
}

/// The slice of `total` items starting at `offset`, and the offset of the next page.
fn page(offset: &str, total: usize) -> (std::ops::Range<usize>, Option<usize>) {
    let start = offset.parse::<usize>().unwrap_or(0).min(total);
    let end = (start + PAGE_SIZE).min(total);
    let next = (end < total).then_some(end);
    (start..end, next)
}

async fn awaits_selection(state: &AppState, key: SessionKey) -> anyhow::Result<bool> {
    Ok(state
        .core
        .dialogs()
        .active(key)
        .await?
        .is_some_and(|d| d.awaits_selection()))
}

pub async fn handle_inline_query(
    bot: Bot,
    q: InlineQuery,
    state: Arc<AppState>,
) -> anyhow::Result<()> {
    let user = user_id(&q.from);
    let core = &state.core;
    if !core.access().is_permitted(Some(user)).await {
        debug!(user = user.0, "ignoring inline query from unauthorized user");
        return Ok(());
    }

    // Inline queries carry no chat; the flow lives in the private session.
    let key = SessionKey::private(user);

    if core.access().is_admin(Some(user)) && awaits_selection(&state, key).await? {
        return answer_user_selection(&bot, &q, &state).await;
    }

    let answer = core.shortener().inline(key, &q.query).await?;
    let switch_pm = answer.start_parameter();
    let results = match &answer {
        InlineAnswer::Nothing => return Ok(()),
        InlineAnswer::Existing { short_url } => {
            vec![article(EXISTING_LINK_RESULT_ID, short_url, short_url)]
        }
        InlineAnswer::Created {
            keyword,
            title,
            short_url,
        } => vec![article(keyword, title, short_url)],
        InlineAnswer::KeywordOccupied { .. } | InlineAnswer::InvalidUrl => Vec::new(),
    };

    let mut request = bot
        .answer_inline_query(q.id.clone(), results)
        .is_personal(true)
        .cache_time(0);
    if let Some(param) = switch_pm {
        let text = match answer {
            InlineAnswer::InvalidUrl => "❌ Invalid URL",
            _ => "❌ Keyword occupied",
        };
        request = request.switch_pm_text(text).switch_pm_parameter(param);
    }
    request.await?;
    Ok(())
}

/// Offer every authorized user as a result; choosing one kicks them.
async fn answer_user_selection(bot: &Bot, q: &InlineQuery, state: &AppState) -> anyhow::Result<()> {
    let users: Vec<UserId> = state.core.access().users().await;
    let (range, next) = page(&q.offset, users.len());

    let mut results = Vec::with_capacity(range.len());
    for user in &users[range] {
        let name = match bot.get_chat(teloxide::types::ChatId(user.0)).await {
            Ok(chat) => display_name(chat.first_name(), chat.last_name(), chat.username()),
            Err(e) => {
                warn!(user = user.0, error = %e, "failed to look up user");
                String::new()
            }
        };
        let name = if name.is_empty() {
            user.0.to_string()
        } else {
            name
        };
        results.push(article(&user.0.to_string(), &name, &name));
    }

    bot.answer_inline_query(q.id.clone(), results)
        .cache_time(0)
        .next_offset(next.map(|n| n.to_string()).unwrap_or_default())
        .await?;
    Ok(())
}

pub async fn handle_chosen_result(r: ChosenInlineResult, state: Arc<AppState>) -> anyhow::Result<()> {
    let key = SessionKey::private(user_id(&r.from));

    if awaits_selection(&state, key).await? {
        state
            .core
            .step_dialog(key, DialogInput::Selection(r.result_id))
            .await?;
        return Ok(());
    }

    let removed = state.core.shortener().chosen(key, &r.result_id).await?;
    debug!(session = %key, kept = %r.result_id, removed, "inline result chosen");
    Ok(())
}
