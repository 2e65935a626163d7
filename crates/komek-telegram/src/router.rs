use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tracing::info;

use komek_core::{
    config::Config, content::ContentStore, ledger::Ledger, messaging::port::MessagingPort,
    session::SessionStore, sweeper::Sweeper,
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub content: ContentStore,
    pub ledger: Ledger,
    pub messenger: Arc<dyn MessagingPort>,
    pub sessions: Arc<SessionStore>,
}

pub async fn run_polling(
    cfg: Arc<Config>,
    content: ContentStore,
    ledger: Ledger,
) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    if let Ok(me) = bot.get_me().await {
        info!("komek started: @{}", me.username());
    }
    info!("data directory: {}", cfg.data_dir.display());

    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));

    let sweeper = Sweeper::new(ledger.clone(), messenger.clone(), cfg.sweep_interval);
    let _sweeper_stop = sweeper.spawn();

    let state = Arc::new(AppState {
        cfg,
        content,
        ledger,
        messenger,
        sessions: Arc::new(SessionStore::default()),
    });

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    Ok(())
}
