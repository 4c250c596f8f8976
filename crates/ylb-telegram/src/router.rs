use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*, types::BotCommand};
use tracing::{info, warn};

use ylb_core::messaging::throttled::{ThrottleConfig, ThrottledMessenger};
use ylb_core::{
    app::BotCore,
    config::Config,
    dialog::DialogKind,
    domain::UserId,
    messaging::port::MessagingPort,
    ports::{ShortenerGateway, StateStore},
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub core: Arc<BotCore>,
    pub messenger: Arc<dyn MessagingPort>,
    /// Our own id, to ignore messages posted through our inline mode.
    pub bot_id: teloxide::types::UserId,
    pub bot_name: String,
}

impl AppState {
    pub fn admin(&self) -> UserId {
        UserId(self.cfg.admin_user_id)
    }
}

pub fn bot_commands() -> Vec<BotCommand> {
    let mut commands: Vec<BotCommand> = DialogKind::ALL
        .into_iter()
        .map(|k| BotCommand::new(k.command(), k.description()))
        .collect();
    commands.push(BotCommand::new("cancel", "Abort the current operation"));
    commands.push(BotCommand::new("help", "Display general information"));
    commands
}

pub async fn run_polling(
    cfg: Arc<Config>,
    gateway: Arc<dyn ShortenerGateway>,
    store: Arc<dyn StateStore>,
) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    let me = bot.get_me().await?;
    info!(username = %me.username(), yourls = %cfg.yourls_url, "bot started");

    // Throttling decorator first; the adapter still retries once on 429 RetryAfter.
    let raw_messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        raw_messenger,
        ThrottleConfig {
            per_chat_min_interval: cfg.per_chat_throttle,
            ..ThrottleConfig::default()
        },
    ));

    let core = Arc::new(
        BotCore::new(
            gateway,
            store,
            messenger.clone(),
            UserId(cfg.admin_user_id),
            cfg.cache_timeout,
        )
        .await?,
    );

    if let Err(e) = bot.set_my_commands(bot_commands()).await {
        warn!(error = %e, "failed to register bot commands");
    }

    let state = Arc::new(AppState {
        cfg: cfg.clone(),
        core,
        messenger,
        bot_id: me.id,
        bot_name: me.full_name(),
    });

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_inline_query().endpoint(handlers::handle_inline_query))
        .branch(
            Update::filter_chosen_inline_result().endpoint(handlers::handle_chosen_inline_result),
        )
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_menu_lists_every_flow_and_help() {
        let commands = bot_commands();
        let names: Vec<_> = commands.iter().map(|c| c.command.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "change_keyword",
                "change_url",
                "delete_url",
                "add_user",
                "kick_user",
                "cancel",
                "help"
            ]
        );
    }
}
