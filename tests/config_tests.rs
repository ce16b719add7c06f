use canvas_fx::config::Configuration;
use canvas_fx::effects::{Effect, EffectId};
use canvas_fx::processing::color::HexColor;
use image::Rgba;
use std::time::Duration;

#[test]
fn empty_config_uses_defaults() {
    let cfg: Configuration = serde_yaml::from_str("{}").unwrap();
    assert_eq!(cfg.effect, EffectId::Mosaic);
    assert!((cfg.scale - 1.0).abs() < f32::EPSILON);
    assert_eq!(cfg.mosaic.pixel_budget, 5000);
    assert_eq!(cfg.mosaic.poll_interval, Duration::from_millis(10));
    assert_eq!(cfg.mosaic.frame_interval, Duration::from_millis(16));
    assert!((cfg.mosaic.block_size - 10.0).abs() < f32::EPSILON);
    assert_eq!(cfg.drop_shadow.color, HexColor::BLACK);
    assert!(cfg.validated().is_ok());
}

#[test]
fn parse_kebab_case_config() {
    let yaml = r##"
scale: 2.0
effect: drop-shadow
mosaic:
  block-size: 7
  pixel-budget: 100
  frame-interval: 0s
blur:
  radius: 3
  scale-canvas: false
drop-shadow:
  offset-x: -4
  blur-radius: 2
  color: "#ff000080"
hue-rotate: 400
"##;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    let cfg = cfg.validated().unwrap();
    assert_eq!(cfg.effect, EffectId::DropShadow);
    assert_eq!(cfg.schedule().pixel_budget, 100);
    assert!(cfg.schedule().frame_interval.is_zero());
    assert_eq!(cfg.schedule().poll_interval, Duration::from_millis(10));

    let effects = cfg.effect_set();
    assert_eq!(effects.mosaic.block().unwrap(), 7);
    assert!(!effects.blur.scale_canvas);
    assert!((effects.drop_shadow.offset_x + 4.0).abs() < f32::EPSILON);
    assert!((effects.drop_shadow.offset_y - 10.0).abs() < f32::EPSILON);
    assert_eq!(effects.drop_shadow.color.rgba(), Rgba([255, 0, 0, 128]));
    assert!((effects.hue_rotate.amount - 400.0).abs() < f32::EPSILON);
    assert_eq!(effects.hue_rotate.id(), EffectId::HueRotate);
}

#[test]
fn camel_case_effect_names_are_accepted() {
    let cfg: Configuration = serde_yaml::from_str("effect: hueRotate").unwrap();
    assert_eq!(cfg.effect, EffectId::HueRotate);
}

#[test]
fn unknown_effect_is_rejected() {
    let err = serde_yaml::from_str::<Configuration>("effect: sepia").unwrap_err();
    assert!(err.to_string().contains("sepia"));
}

#[test]
fn bad_colour_is_rejected() {
    let yaml = "drop-shadow:\n  color: \"red\"\n";
    assert!(serde_yaml::from_str::<Configuration>(yaml).is_err());
}

#[test]
fn validation_rejects_out_of_range_values() {
    for yaml in [
        "scale: 0",
        "mosaic:\n  block-size: 0.5",
        "mosaic:\n  pixel-budget: 0",
        "brightness: -1",
        "blur:\n  radius: -2",
        "drop-shadow:\n  blur-radius: -1",
    ] {
        let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
        assert!(cfg.validated().is_err(), "accepted {yaml:?}");
    }
}

#[test]
fn loads_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "effect: invert\ninvert: 40\n").unwrap();
    let cfg = Configuration::from_yaml_file(&path).unwrap();
    assert_eq!(cfg.effect, EffectId::Invert);
    assert!((cfg.invert - 40.0).abs() < f32::EPSILON);
    assert!(Configuration::from_yaml_file(dir.path().join("missing.yaml")).is_err());
}

#[test]
fn malformed_file_names_the_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.yaml");
    std::fs::write(&path, "scale: [1, 2\n").unwrap();
    let err = Configuration::from_yaml_file(&path).unwrap_err();
    assert!(format!("{err:#}").contains("broken.yaml"), "{err:#}");
    assert!(err.downcast_ref::<serde_yaml::Error>().is_some());
}
