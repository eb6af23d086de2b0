use std::sync::Arc;
use std::time::Duration;

use actix_web::{middleware, web, App, HttpServer};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;

use salonbook::clock::{Clock, SystemClock};
use salonbook::config::Config;
use salonbook::notify::WhatsAppBridge;
use salonbook::reminders::ReminderScheduler;
use salonbook::state::{AdminContact, AppState, ScopeLocks};
use salonbook::{db, routes};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(err) = run().await {
        eprintln!("Startup error: {err}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .init();

    let config = Config::from_env();
    db::ensure_sqlite_dir(&config.database_url)?;

    let connect_options = SqliteConnectOptions::from_str(&config.database_url)?
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options)
        .await?;

    let clock = Arc::new(SystemClock::new(config.tz_offset_minutes));

    db::run_migrations(&pool).await?;
    db::seed_defaults(&pool, clock.now()).await?;

    let state = AppState {
        db: pool.clone(),
        clock,
        notifier: Arc::new(WhatsAppBridge::new(config.whatsapp_bridge_url.clone())),
        booking_locks: ScopeLocks::new(),
        admin: AdminContact {
            phone: config.admin_phone.clone(),
            telegram_bot_token: config.telegram_bot_token.clone(),
            telegram_chat_id: config.telegram_chat_id.clone(),
        },
    };

    let scheduler = ReminderScheduler::start(
        state.clone(),
        Duration::from_secs(config.reminder_interval_secs),
    );

    let address = format!("0.0.0.0:{}", config.port);
    log::info!("Starting Salonbook on http://{address}");

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(middleware::Logger::default())
            .configure(routes::public::configure)
            .configure(routes::admin::configure)
            .configure(routes::webhooks::configure)
    })
    .bind(address)?
    .run()
    .await?;

    scheduler.shutdown();
    Ok(())
}
