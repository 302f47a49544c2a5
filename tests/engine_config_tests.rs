use scopetab::analysis::{AnalysisMode, Estimator};
use scopetab::core::{Channel, ConfigError};
use scopetab::engine::AcquisitionConfig;
use serde_json::json;

#[test]
fn test_full_config() {
    let config = AcquisitionConfig::from_json(json!({
        "address": "TCPIP0::192.168.0.5::inst0::INSTR",
        "channels": [1, 2],
        "modes": ["time_domain", "xy_transform"],
        "estimator": "welch",
        "chunk_size": 25000,
        "xy": {"force_zero": 4.6},
        "fit": {"max_iterations": 50}
    }))
    .unwrap();

    assert_eq!(config.estimator, Estimator::Welch);
    assert_eq!(config.chunk_size, 25_000);
    assert_eq!(config.xy.force_zero, 4.6);
    assert_eq!(config.xy.force_gain, 4.108);
    assert_eq!(config.fit.max_iterations, 50);
    assert_eq!(config.xy_roles(), Some((Channel(1), Channel(2))));
    assert!(config.plan().modes.contains(AnalysisMode::XyTransform));
}

#[test]
fn test_validation_errors() {
    let base = json!({"address": "sim", "channels": [1, 2, 3], "modes": ["time_domain"]});
    assert!(AcquisitionConfig::from_json(base.clone()).is_ok());

    let mut xy = base.clone();
    xy["modes"] = json!(["xy_transform"]);
    assert_eq!(AcquisitionConfig::from_json(xy), Err(ConfigError::XyChannelCount(3)));

    let mut empty = base.clone();
    empty["channels"] = json!([]);
    assert_eq!(AcquisitionConfig::from_json(empty), Err(ConfigError::NoChannels));

    let mut zero = base.clone();
    zero["channels"] = json!([0, 1]);
    assert_eq!(AcquisitionConfig::from_json(zero), Err(ConfigError::InvalidChannel));

    let mut dup = base.clone();
    dup["channels"] = json!([2, 1, 2]);
    assert_eq!(AcquisitionConfig::from_json(dup), Err(ConfigError::DuplicateChannel(Channel(2))));

    let mut no_modes = base.clone();
    no_modes["modes"] = json!([]);
    assert_eq!(AcquisitionConfig::from_json(no_modes), Err(ConfigError::NoModes));

    let mut chunk = base;
    chunk["chunk_size"] = json!(0);
    assert_eq!(AcquisitionConfig::from_json(chunk), Err(ConfigError::InvalidChunkSize));
}

#[test]
fn test_from_file() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("acquisition.json");
    std::fs::write(
        &path,
        r#"{"address": "sim", "channels": [4], "modes": ["resonance"], "amp_gain": 31.6}"#,
    )?;

    let config = AcquisitionConfig::from_file(&path)?;
    assert_eq!(config.channels, vec![Channel(4)]);
    assert_eq!(config.gain_for(Channel(4)), 31.6);

    assert!(AcquisitionConfig::from_file(dir.path().join("missing.json")).is_err());
    Ok(())
}
