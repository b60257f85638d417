use finance_buddy::{
    api::{self, AppState},
    bot,
    config::{self, database},
    errors::Result,
};
use std::{env, sync::Arc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Environment variables may also be set externally
    if dotenvy::dotenv().is_err() {
        info!("No .env file found, using the process environment");
    }

    let app_config = Arc::new(config::load_app_configuration()?);

    let db = database::create_connection(&app_config.database_url)
        .await
        .inspect_err(|e| error!("Failed to connect to database: {e}"))?;
    database::create_tables(&db).await?;

    match env::var("DISCORD_BOT_TOKEN") {
        Ok(token) => {
            let bot_config = Arc::clone(&app_config);
            let bot_db = db.clone();
            tokio::spawn(async move {
                if let Err(e) = bot::run_bot(token, bot_config, bot_db).await {
                    error!("Discord bot stopped: {e}");
                }
            });
        }
        Err(_) => warn!("DISCORD_BOT_TOKEN not set, running without the Discord bot"),
    }

    api::run_server(AppState::new(db, app_config)).await
}
