use std::sync::Arc;

use komek_core::{config::Config, content::ContentStore, ledger::Ledger};

#[tokio::main]
async fn main() -> Result<(), komek_core::Error> {
    komek_core::logging::init("komek");

    let cfg = Arc::new(Config::load()?);
    let ledger = Ledger::open(&cfg.db_path())?;
    let content = ContentStore::new(cfg.chapters_file(), cfg.lessons_dir());

    komek_telegram::router::run_polling(cfg, content, ledger)
        .await
        .map_err(|e| komek_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
