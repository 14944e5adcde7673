//! Config Validation Tests
//!
//! Typo detection with suggestions, structural validation and physical
//! range checks for `aquawatch.toml`.
//!
//! These tests exercise the config layer independently from the rest of the
//! pipeline.

use std::io::Write;

use aquawatch::config::validation::{
    known_config_keys, suggest_correction, validate_physical_ranges, validate_unknown_keys,
};
use aquawatch::config::{AquaConfig, ConfigError, TankConfig};
use aquawatch::severity::Band;

fn validation_errors(result: Result<AquaConfig, ConfigError>) -> Vec<String> {
    match result {
        Err(ConfigError::Validation(errors)) => errors,
        Err(other) => panic!("expected a validation error, got {other}"),
        Ok(_) => panic!("expected a validation error, config was accepted"),
    }
}

// ============================================================================
// Typo Detection
// ============================================================================

#[test]
fn typo_in_simulation_key_warns_with_suggestion() {
    let toml_str = r#"
[simulation]
spike_probabilty = 0.01
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1, "Expected exactly 1 warning");
    assert!(warnings[0].field.contains("spike_probabilty"));
    assert_eq!(
        warnings[0].suggestion.as_deref(),
        Some("simulation.spike_probability"),
        "Should suggest the correct spelling"
    );
}

#[test]
fn typo_in_nested_threshold_warns() {
    let toml_str = r#"
[thresholds.oxygen.operational]
minn = 70.0
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1);
    assert_eq!(
        warnings[0].suggestion.as_deref(),
        Some("thresholds.oxygen.operational.min")
    );
}

#[test]
fn unrelated_key_has_no_suggestion() {
    let warnings = validate_unknown_keys("[simulation]\nwhale_song_volume = 11\n");
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].suggestion.is_none());
    assert!(warnings[0].to_string().contains("whale_song_volume"));
}

#[test]
fn valid_config_produces_zero_warnings() {
    let toml_str = r#"
[farm]
name = "Lagoa Norte"
utc_offset_minutes = -180

[simulation]
tick_interval_secs = 60
seed = 7
feed_times_minutes = [420, 1020]

[optimizer]
population_size = 40
seed = 9

[monitor]
reconcile_every_ticks = 10
optimizer_threads = 4

[[tanks]]
id = 1
name = "Nursery"
capacity_liters = 5000.0
fish_count = 80
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
}

#[test]
fn serialized_defaults_use_only_known_keys() {
    let toml_str = AquaConfig::default().to_toml().unwrap();
    let warnings = validate_unknown_keys(&toml_str);
    assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
}

#[test]
fn suggestion_respects_edit_distance() {
    let known = known_config_keys();
    assert_eq!(
        suggest_correction("monitor.data_dri", &known).as_deref(),
        Some("monitor.data_dir")
    );
    assert_eq!(suggest_correction("monitor.completely_wrong", &known), None);
}

#[test]
fn unknown_keys_do_not_fail_loading() {
    let config = AquaConfig::from_toml_str("[farm]\nnmae = \"typo\"\n").unwrap();
    assert_eq!(config.farm.name, AquaConfig::default().farm.name);
}

// ============================================================================
// Loading
// ============================================================================

#[test]
fn defaults_validate() {
    AquaConfig::default().validate().unwrap();
}

#[test]
fn empty_file_yields_defaults() {
    let config = AquaConfig::from_toml_str("").unwrap();
    assert_eq!(config.tanks.len(), 4);
    assert_eq!(config.simulation.tick_interval_secs, 30);
    assert_eq!(config.optimizer.population_size, 28);
}

#[test]
fn toml_round_trip_preserves_values() {
    let mut config = AquaConfig::default();
    config.simulation.seed = Some(1234);
    config.farm.utc_offset_minutes = 60;
    config.tanks.push(TankConfig {
        id: 12,
        name: "Quarantine".to_string(),
        capacity_liters: 2_000.0,
        fish_count: 20,
        active: false,
        profile: None,
    });

    let reparsed = AquaConfig::from_toml_str(&config.to_toml().unwrap()).unwrap();
    assert_eq!(reparsed.simulation.seed, Some(1234));
    assert_eq!(reparsed.farm.offset().local_minus_utc(), 3_600);
    assert_eq!(reparsed.tanks.len(), 5);
    assert!(!reparsed.tanks[4].active);
    assert_eq!(reparsed.thresholds, config.thresholds);
}

#[test]
fn load_from_file_reports_the_path() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[simulation\ntick_interval_secs = 10").unwrap();

    match AquaConfig::load_from_file(file.path()) {
        Err(ConfigError::Parse(path, _)) => assert_eq!(path, file.path()),
        other => panic!("expected a parse error, got {other:?}"),
    }

    let missing = file.path().with_extension("missing");
    assert!(matches!(
        AquaConfig::load_from_file(&missing),
        Err(ConfigError::Io(..))
    ));
}

#[test]
fn load_from_file_applies_overrides() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "[thresholds.turbidity]\noperational = {{ max = 40.0 }}\ncritical = {{ max = 90.0 }}"
    )
    .unwrap();

    let config = AquaConfig::load_from_file(file.path()).unwrap();
    assert_eq!(config.thresholds.turbidity.operational, Band::at_most(40.0));
    assert_eq!(config.thresholds.oxygen.operational, Band::at_least(70.0));
}

// ============================================================================
// Structural Validation
// ============================================================================

#[test]
fn operational_band_must_sit_inside_critical() {
    let toml_str = r#"
[thresholds.temperature]
operational = { min = 24.0, max = 28.0 }
critical = { min = 25.0, max = 35.0 }
"#;
    let errors = validation_errors(AquaConfig::from_toml_str(toml_str));
    assert!(
        errors.iter().any(|e| e.contains("thresholds.temperature") && e.contains("critical.min")),
        "{errors:?}"
    );
}

#[test]
fn duplicate_tank_ids_are_rejected() {
    let toml_str = r#"
[[tanks]]
id = 3
name = "A"
capacity_liters = 1000.0
fish_count = 10

[[tanks]]
id = 3
name = "B"
capacity_liters = 1000.0
fish_count = 10
"#;
    let errors = validation_errors(AquaConfig::from_toml_str(toml_str));
    assert!(errors.iter().any(|e| e.contains("duplicate tank id 3")));
}

#[test]
fn probabilities_and_cadences_are_checked() {
    let toml_str = r#"
[simulation]
spike_probability = 1.5

[monitor]
reconcile_every_ticks = 0
"#;
    let errors = validation_errors(AquaConfig::from_toml_str(toml_str));
    assert!(errors.iter().any(|e| e.contains("simulation.spike_probability")));
    assert!(errors.iter().any(|e| e.contains("monitor")));
}

#[test]
fn optimizer_errors_are_prefixed() {
    let errors = validation_errors(AquaConfig::from_toml_str(
        "[optimizer]\ntournament_size = 100\n",
    ));
    assert!(errors.iter().any(|e| e.starts_with("optimizer.tournament_size")));
}

#[test]
fn tick_interval_longer_than_a_day_is_rejected() {
    let errors = validation_errors(AquaConfig::from_toml_str(
        "[simulation]\ntick_interval_secs = 9223372036854775807\n",
    ));
    assert!(
        errors.iter().any(|e| e.starts_with("simulation.tick_interval_secs")),
        "{errors:?}"
    );

    let mut config = AquaConfig::default();
    config.simulation.tick_interval_secs = u64::MAX;
    assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

    config.simulation.tick_interval_secs = 86_400;
    config.validate().unwrap();
}

#[test]
fn every_problem_is_reported_at_once() {
    let mut config = AquaConfig::default();
    config.simulation.tick_interval_secs = 0;
    config.feeding.ga_blend = 2.0;
    config.farm.utc_offset_minutes = 2_000;
    match config.validate() {
        Err(ConfigError::Validation(errors)) => assert!(errors.len() >= 3, "{errors:?}"),
        other => panic!("expected validation failure, got {other:?}"),
    }
}

// ============================================================================
// Physical Range Validation
// ============================================================================

#[test]
fn thresholds_outside_physical_range_are_errors() {
    let mut config = AquaConfig::default();
    config.thresholds.ph.critical = Band::between(-1.0, 9.0);
    let (errors, _) = validate_physical_ranges(&config);
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert!(errors[0].contains("thresholds.ph.critical.min"));
}

#[test]
fn overcrowded_tank_is_a_warning_not_an_error() {
    let mut config = AquaConfig::default();
    config.tanks[0].fish_count = 1_000;
    let (errors, warnings) = validate_physical_ranges(&config);
    assert!(errors.is_empty());
    assert!(warnings.iter().any(|w| w.field == "tanks[1]"));
    config.validate().unwrap();
}

#[test]
fn coarse_tick_warns() {
    let mut config = AquaConfig::default();
    config.simulation.tick_interval_secs = 900;
    let (_, warnings) = validate_physical_ranges(&config);
    assert!(warnings
        .iter()
        .any(|w| w.field == "simulation.tick_interval_secs"));
}
