pub mod loader;
pub mod schema;

pub use loader::{load_settings, load_settings_from_str, load_settings_or_default};
pub use schema::{default_config_dir, default_settings_path, Settings, APP_NAME};
