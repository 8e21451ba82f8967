//! Configuration: file lookup, nested settings and the bot's typed view.

pub mod bot;
pub mod settings;
pub mod store;

pub use bot::{BotConfig, Endpoint};
pub use settings::Settings;
pub use store::{user_config_path, ConfigStore, SYSTEM_CONFIG_PATH};
