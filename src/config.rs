use std::env;

/// Runtime configuration, read once at startup from the environment.
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// Local timezone as a fixed offset from UTC, in minutes.
    pub tz_offset_minutes: i32,
    /// Base URL of the WhatsApp bridge; unset disables client messaging.
    pub whatsapp_bridge_url: Option<String>,
    /// Shop owner's phone for WhatsApp copies of cancellations etc.
    pub admin_phone: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    /// Seconds between reminder scans.
    pub reminder_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://./data/salonbook.db".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(8080),
            tz_offset_minutes: env::var("TZ_OFFSET_MINUTES")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(0),
            whatsapp_bridge_url: non_empty(env::var("WHATSAPP_BRIDGE_URL").ok()),
            admin_phone: non_empty(env::var("ADMIN_PHONE").ok()),
            telegram_bot_token: non_empty(env::var("TELEGRAM_BOT_TOKEN").ok()),
            telegram_chat_id: non_empty(env::var("TELEGRAM_CHAT_ID").ok()),
            reminder_interval_secs: env::var("REMINDER_INTERVAL_SECS")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(15 * 60),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
