// ============================
// taskvault-backend/src/config/config_tests.rs
// ============================
//! Settings defaults and validation.
use super::*;

#[test]
fn test_default_settings_are_valid() {
    let settings = Settings::default();
    assert!(settings.validate().is_ok());
    assert!(settings.database.dsn.is_none());
    assert_eq!(settings.rate_limit.idle_window_secs, 180);
    assert_eq!(settings.activation.code_ttl_secs, 60);
    assert_eq!(settings.query_timeout(), Duration::from_secs(5));
}

#[test]
fn test_settings_validation() {
    let settings = Settings::default();

    let mut invalid = settings.clone();
    invalid.log_level = "loud".to_string();
    assert_eq!(
        invalid.validate(),
        Err(ConfigError::LogLevel("loud".to_string()))
    );

    let mut invalid = settings.clone();
    invalid.environment = "staging".to_string();
    assert!(matches!(invalid.validate(), Err(ConfigError::Environment(_))));

    let mut invalid = settings.clone();
    invalid.jwt.secret = "short".to_string();
    assert_eq!(invalid.validate(), Err(ConfigError::WeakSecret));

    let mut invalid = settings.clone();
    invalid.rate_limit.burst = 0;
    assert_eq!(invalid.validate(), Err(ConfigError::Zero("rate_limit.burst")));

    let mut invalid = settings.clone();
    invalid.rate_limit.requests_per_second = f64::NAN;
    assert!(invalid.validate().is_err());

    let mut invalid = settings.clone();
    invalid.activation.code_ttl_secs = 0;
    assert!(invalid.validate().is_err());

    let mut invalid = settings.clone();
    invalid.mail.max_attempts = 0;
    assert!(invalid.validate().is_err());

    let mut invalid = settings;
    invalid.password.r = 0;
    assert!(matches!(invalid.validate(), Err(ConfigError::Password(_))));
}

#[test]
fn test_values_that_cannot_be_represented_are_rejected() {
    let settings = Settings::default();

    let mut invalid = settings.clone();
    invalid.rate_limit.requests_per_second = 1e-20;
    assert_eq!(invalid.validate(), Err(ConfigError::RateTooLow));

    let mut valid = settings.clone();
    valid.rate_limit.requests_per_second = MIN_REQUESTS_PER_SECOND;
    assert!(valid.validate().is_ok());

    let mut invalid = settings.clone();
    invalid.jwt.token_ttl_secs = 1_000_000_000_000_000;
    assert_eq!(
        invalid.validate(),
        Err(ConfigError::TooLong("jwt.token_ttl_secs"))
    );

    let mut invalid = settings.clone();
    invalid.activation.code_ttl_secs = MAX_DURATION_SECS + 1;
    assert_eq!(
        invalid.validate(),
        Err(ConfigError::TooLong("activation.code_ttl_secs"))
    );

    let mut valid = settings;
    valid.jwt.token_ttl_secs = MAX_DURATION_SECS;
    assert!(valid.validate().is_ok());
}

#[test]
fn test_production_refuses_development_secret() {
    let mut settings = Settings::default();
    settings.environment = "production".to_string();
    assert_eq!(settings.validate(), Err(ConfigError::DevelopmentSecret));

    settings.jwt.secret = "a-real-production-secret-of-enough-length".to_string();
    assert!(settings.validate().is_ok());
}

#[test]
fn test_load_settings_from_file_and_env() {
    figment::Jail::expect_with(|jail| {
        jail.create_file(
            DEFAULT_CONFIG_FILE,
            r#"
            bind_addr = "0.0.0.0:4000"
            log_level = "debug"

            [rate_limit]
            requests_per_second = 5.0
            burst = 10

            [database]
            dsn = "postgres://taskvault@localhost/taskvault"
            "#,
        )?;
        jail.set_env("TASKVAULT_LOG_LEVEL", "warn");
        jail.set_env("TASKVAULT_ACTIVATION__CODE_TTL_SECS", "120");

        let settings: Settings = Settings::figment(None).extract()?;
        assert_eq!(settings.bind_addr.to_string(), "0.0.0.0:4000");
        // Environment variable takes precedence
        assert_eq!(settings.log_level, "warn");
        assert_eq!(settings.rate_limit.burst, 10);
        assert_eq!(settings.rate_limit.requests_per_second, 5.0);
        assert_eq!(settings.activation.code_ttl_secs, 120);
        // untouched sections keep their defaults
        assert_eq!(settings.activation.sweep_interval_secs, 60);
        assert_eq!(
            settings.database.dsn.as_deref(),
            Some("postgres://taskvault@localhost/taskvault")
        );
        assert!(settings.validate().is_ok());
        Ok(())
    });
}

#[test]
fn test_missing_config_file_falls_back_to_defaults() {
    figment::Jail::expect_with(|_jail| {
        let settings: Settings = Settings::figment(None).extract()?;
        assert_eq!(settings.bind_addr, Settings::default().bind_addr);
        assert_eq!(settings.log_format, LogFormat::Pretty);
        Ok(())
    });
}
