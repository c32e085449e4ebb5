fn settings() -> Settings {
    let home = std::env::var("APP_HOME").unwrap_or_else(|_| "/opt/app".to_string());
    let level = overrides.get("level").unwrap_or(&default_level);
    Settings { home, level }
}
