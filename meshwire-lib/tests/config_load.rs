use std::fs;

use meshwire_lib::config::load_from_path;

#[test]
fn loads_empty_config_with_defaults() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("empty.toml");
    fs::write(&path, "")?;

    let cfg = load_from_path(&path)?;
    assert_eq!(cfg.host, "0.0.0.0");
    assert_eq!(cfg.port, 0);
    assert_eq!(cfg.traffic_profile, "gaming");
    assert_eq!(cfg.obfuscation, "none");
    assert!(!cfg.reliable_mode);
    Ok(())
}

#[test]
fn loads_full_config() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("full.toml");
    let toml = r#"
host = "127.0.0.1"
port = 5000
traffic_profile = "voice_call"
obfuscation = "xor"
obfuscation_key = "game-key-123"
reliable_mode = true
"#;
    fs::write(&path, toml)?;

    let cfg = load_from_path(&path)?;
    assert_eq!(cfg.host, "127.0.0.1");
    assert_eq!(cfg.port, 5000);
    assert_eq!(cfg.traffic_profile, "voice_call");
    assert_eq!(cfg.obfuscation, "xor");
    assert_eq!(cfg.obfuscation_key, "game-key-123");
    assert!(cfg.reliable_mode);
    Ok(())
}

#[test]
fn rejects_malformed_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    fs::write(&path, "port = \"not a number\"").unwrap();
    assert!(load_from_path(&path).is_err());
}

#[test]
fn missing_file_is_an_error() {
    assert!(load_from_path("/nonexistent/meshwire.toml").is_err());
}
