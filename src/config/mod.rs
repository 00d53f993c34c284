mod settings;

use crate::config::settings::PartialSettings;
use config::{Config, ConfigError, Environment, File};

pub use settings::{RealtimeSettings, ServerSettings, Settings};

/// Loads the configuration from the default file and environment variables
/// and merges it with default values.
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(Environment::default().separator("_"));

    let config = builder.build()?;

    // Take what is available and fill the rest from defaults.
    let partial: PartialSettings = config.try_deserialize()?;
    let default = Settings::default();

    Ok(Settings {
        server: ServerSettings {
            host: partial
                .server
                .as_ref()
                .and_then(|s| s.host.clone())
                .unwrap_or(default.server.host),
            port: partial
                .server
                .as_ref()
                .and_then(|s| s.port)
                .unwrap_or(default.server.port),
            jwt_secret: partial
                .server
                .as_ref()
                .and_then(|s| s.jwt_secret.clone())
                .unwrap_or(default.server.jwt_secret),
        },
        realtime: RealtimeSettings {
            retry_base_ms: partial
                .realtime
                .as_ref()
                .and_then(|r| r.retry_base_ms)
                .unwrap_or(default.realtime.retry_base_ms),
            retry_cap_ms: partial
                .realtime
                .as_ref()
                .and_then(|r| r.retry_cap_ms)
                .unwrap_or(default.realtime.retry_cap_ms),
            max_retry_attempts: partial
                .realtime
                .as_ref()
                .and_then(|r| r.max_retry_attempts)
                .unwrap_or(default.realtime.max_retry_attempts),
            typing_debounce_ms: partial
                .realtime
                .as_ref()
                .and_then(|r| r.typing_debounce_ms)
                .unwrap_or(default.realtime.typing_debounce_ms),
            typing_idle_ms: partial
                .realtime
                .as_ref()
                .and_then(|r| r.typing_idle_ms)
                .unwrap_or(default.realtime.typing_idle_ms),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn default_settings_are_sane() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.realtime.max_retry_attempts, 5);
        assert!(settings.realtime.retry_cap_ms >= settings.realtime.retry_base_ms);
    }

    #[test]
    #[serial]
    fn load_config_from_file_overrides_defaults() {
        // Run from a temp dir so load_config picks up config/default.toml
        // written there.
        let tmp = TempDir::new().expect("create tempdir");
        let orig = env::current_dir().expect("current_dir");
        env::set_current_dir(tmp.path()).expect("set current dir");

        fs::create_dir_all("config").expect("create config dir");
        let toml = r#"
            [server]
            host = "0.0.0.0"
            port = 9000
            jwt_secret = "file_secret"

            [realtime]
            retry_base_ms = 250
            max_retry_attempts = 8
        "#;
        fs::write("config/default.toml", toml).expect("write config file");

        let cfg = load_config().expect("load_config failed");
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.server.jwt_secret, "file_secret");
        assert_eq!(cfg.realtime.retry_base_ms, 250);
        assert_eq!(cfg.realtime.max_retry_attempts, 8);
        // Untouched keys keep their defaults.
        assert_eq!(cfg.realtime.typing_idle_ms, 3000);

        env::set_current_dir(orig).expect("restore cwd");
    }
}
