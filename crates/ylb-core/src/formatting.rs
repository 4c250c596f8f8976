//! User-facing texts (Telegram HTML parse mode).

pub const HOMEPAGE: &str = "https://hirschheissich.gitlab.io/yourls-bot/";
pub const USER_GUIDE: &str = "https://hirschheissich.gitlab.io/yourls-bot/userguide.html";
pub const YOURLS_HOMEPAGE: &str = "https://yourls.org";

pub const OPERATION_ABORTED: &str = "Operation aborted.";
pub const PROMPT_EXPIRED: &str = "This prompt has expired.";
pub const PROMPT_NOT_YOURS: &str = "This button belongs to someone else's operation.";
pub const REMOTE_FAILURE: &str =
    "Something went wrong. The short URL was not updated. Sorry about that 😕";
pub const DELETE_FAILURE: &str =
    "Something went wrong. The short URL was not deleted. Sorry about that 😕";
pub const SHORTENER_UNREACHABLE: &str =
    "I could not reach the YOURLS instance right now. Please send the keyword again.";
pub const NOTHING_TO_CANCEL: &str = "There is nothing to cancel.";

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn keyword_missing(keyword: &str) -> String {
    format!(
        "The keyword »<code>{}</code>« does not exist. Maybe a typo?",
        escape_html(keyword)
    )
}

pub fn keyword_in_use(keyword: &str) -> String {
    format!(
        "The keyword <code>{}</code> is already in use. Please choose another.",
        escape_html(keyword)
    )
}

pub fn info_text(bot_name: &str, instance_url: &str) -> String {
    format!(
        "Hi! I am <b>{}</b> and here to create and manage short URLs with the YOURLS instance \
         hosted at {}. Please note that I will only respond to users explicitly allowed by my \
         admin.\n\nFor details on how to use me, please visit the user guide below. 🙂",
        escape_html(bot_name),
        escape_html(instance_url)
    )
}
