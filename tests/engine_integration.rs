use std::time::Duration;

use canvas_fx::effects::{DrawOutcome, EffectId, EffectSet};
use canvas_fx::events::{AlertKind, LoadedImage};
use canvas_fx::tasks::mosaic::MosaicSchedule;
use canvas_fx::Engine;
use image::{Rgba, RgbaImage};
use tokio::sync::mpsc;

fn schedule() -> MosaicSchedule {
    MosaicSchedule {
        pixel_budget: 5000,
        poll_interval: Duration::from_millis(1),
        frame_interval: Duration::ZERO,
    }
}

fn source() -> RgbaImage {
    RgbaImage::from_fn(40, 30, |x, y| {
        Rgba([(x * 6) as u8, (y * 8) as u8, 90, 255])
    })
}

fn engine_with(effect: EffectId) -> Engine {
    Engine::new(EffectSet::default(), schedule(), 1.0)
        .unwrap()
        .with_initial_effect(effect)
}

fn loaded() -> LoadedImage {
    LoadedImage {
        name: "sample.jpg".into(),
        image: source(),
    }
}

/// Sets the primary parameter of `id` to `value`.
fn set_primary(effects: &mut EffectSet, id: EffectId, value: f32) {
    match id {
        EffectId::Mosaic => effects.mosaic.block_size = value,
        EffectId::Blur => effects.blur.radius = value,
        EffectId::Brightness => effects.brightness.amount = value,
        EffectId::Contrast => effects.contrast.amount = value,
        EffectId::DropShadow => effects.drop_shadow.blur_radius = value,
        EffectId::Grayscale => effects.grayscale.amount = value,
        EffectId::HueRotate => effects.hue_rotate.amount = value,
        EffectId::Invert => effects.invert.amount = value,
        EffectId::Opacity => effects.opacity.amount = value,
        EffectId::Saturate => effects.saturate.amount = value,
    }
}

#[tokio::test]
async fn invalid_parameters_leave_the_buffer_untouched() {
    for id in EffectId::ALL {
        for bad in [f32::NAN, -1.0] {
            let mut engine = engine_with(EffectId::Invert);
            engine.image_loaded(loaded());
            let before = engine.snapshot().unwrap();

            set_primary(engine.effects_mut(), *id, bad);
            let outcome = engine.draw(id.as_str());
            let outcomes = engine.settle().await;
            if *id == EffectId::Mosaic {
                assert_eq!(outcome, DrawOutcome::Scheduled);
                assert_eq!(outcomes, vec![DrawOutcome::Skipped]);
            } else {
                assert_eq!(outcome, DrawOutcome::Skipped, "{id} with {bad}");
            }
            assert_eq!(engine.snapshot().unwrap(), before, "{id} with {bad}");
        }
    }
}

#[tokio::test]
async fn brightness_one_is_identity() {
    let mut engine = engine_with(EffectId::Brightness);
    assert_eq!(engine.image_loaded(loaded()), DrawOutcome::Drawn);
    assert_eq!(engine.snapshot().unwrap(), source());
}

#[tokio::test]
async fn blur_and_shadow_geometry() {
    let mut engine = engine_with(EffectId::Invert);
    engine.image_loaded(loaded());
    engine.set_scale(2.0).unwrap();

    engine.effects_mut().blur.radius = 4.0;
    engine.effects_mut().blur.scale_canvas = true;
    assert_eq!(engine.draw("blur"), DrawOutcome::Drawn);
    // spread = 4 * 2.5 / 2 = 5 logical px
    assert_eq!(engine.snapshot().unwrap().dimensions(), (100, 80));

    let shadow = &mut engine.effects_mut().drop_shadow;
    shadow.blur_radius = 2.0;
    shadow.offset_x = 12.0;
    shadow.offset_y = -1.0;
    assert_eq!(engine.draw("dropShadow"), DrawOutcome::Drawn);
    // spread 2.5; width 40 + 5 + 9.5, height 30 + 5
    assert_eq!(engine.snapshot().unwrap().dimensions(), (109, 70));
}

#[tokio::test]
async fn rescale_replays_last_effect() {
    let mut engine = engine_with(EffectId::Mosaic);
    assert_eq!(engine.image_loaded(loaded()), DrawOutcome::Scheduled);
    engine.settle().await;
    assert_eq!(engine.snapshot().unwrap().dimensions(), (40, 30));

    assert_eq!(engine.set_scale(1.5).unwrap(), DrawOutcome::Scheduled);
    assert_eq!(engine.settle().await, vec![DrawOutcome::Drawn]);
    assert_eq!(engine.snapshot().unwrap().dimensions(), (60, 45));

    assert!(engine.set_scale(f32::NAN).is_err());
    assert_eq!(engine.reset_scale().unwrap(), DrawOutcome::Scheduled);
    engine.settle().await;
    assert_eq!(engine.snapshot().unwrap().dimensions(), (40, 30));
}

#[tokio::test]
async fn select_refits_after_enlarging_effect() {
    let mut engine = engine_with(EffectId::Blur);
    engine.image_loaded(loaded());
    assert_ne!(engine.snapshot().unwrap().dimensions(), (40, 30));

    assert_eq!(engine.select_effect("grayscale"), DrawOutcome::Drawn);
    let out = engine.snapshot().unwrap();
    assert_eq!(out.dimensions(), (40, 30));
    let p = out.get_pixel(10, 10);
    assert!((i32::from(p[0]) - i32::from(p[2])).abs() <= 1);
    assert_eq!(engine.last_effect(), EffectId::Grayscale);

    assert_eq!(engine.draw_last(), DrawOutcome::Drawn);
}

#[tokio::test]
async fn sync_draw_cancels_pending_mosaic() {
    let mut engine = engine_with(EffectId::Mosaic);
    assert_eq!(engine.image_loaded(loaded()), DrawOutcome::Scheduled);
    assert_eq!(engine.draw("invert"), DrawOutcome::Drawn);
    let inverted = engine.snapshot().unwrap();

    let outcomes = engine.settle().await;
    assert!(
        outcomes
            .iter()
            .all(|o| matches!(o, DrawOutcome::Cancelled | DrawOutcome::Superseded))
    );
    assert_eq!(engine.snapshot().unwrap(), inverted);
    let p = inverted.get_pixel(0, 0);
    assert_eq!(*p, Rgba([255, 255, 165, 255]));
}

#[tokio::test]
async fn export_writes_png_named_after_image() {
    let (tx, mut rx) = mpsc::channel(4);
    let mut engine = engine_with(EffectId::Opacity).with_alerts(tx);
    engine.image_loaded(loaded());
    assert_eq!(engine.export_file_name(), "sample.png");

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(engine.export_file_name());
    engine.save_png(&path).unwrap();
    let decoded = image::open(&path).unwrap().to_rgba8();
    assert_eq!(decoded, engine.snapshot().unwrap());
    assert_eq!(decoded.get_pixel(0, 0)[3], 128);

    assert!(engine.save_png(dir.path().join("no/such/dir.png")).is_err());
    assert_eq!(rx.try_recv().unwrap().kind, AlertKind::ExportFailed);
    engine.shutdown().await;
}

#[tokio::test]
async fn loads_images_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("disk.png");
    source().save(&path).unwrap();

    let mut engine = engine_with(EffectId::Brightness);
    assert_eq!(engine.load_path(&path).await, DrawOutcome::Drawn);
    assert_eq!(engine.image_name(), Some("disk.png"));
    assert_eq!(engine.snapshot().unwrap(), source());
}

#[tokio::test]
async fn oversized_canvas_fails_and_engine_recovers() {
    let (tx, mut rx) = mpsc::channel(8);
    let mut engine = engine_with(EffectId::Invert).with_alerts(tx);
    assert_eq!(engine.image_loaded(loaded()), DrawOutcome::Drawn);
    let before = engine.snapshot().unwrap();

    engine.effects_mut().blur.radius = 1e9;
    assert_eq!(engine.draw("blur"), DrawOutcome::Failed);
    assert_eq!(rx.try_recv().unwrap().kind, AlertKind::EffectFailed);
    assert_eq!(engine.snapshot().unwrap(), before);

    engine.effects_mut().drop_shadow.offset_x = 1e10;
    engine.effects_mut().drop_shadow.offset_y = 1e10;
    assert_eq!(engine.draw("drop-shadow"), DrawOutcome::Failed);
    assert_eq!(rx.try_recv().unwrap().kind, AlertKind::EffectFailed);
    assert_eq!(engine.snapshot().unwrap(), before);

    // the surface lock survives and later draws work
    assert_eq!(engine.draw("invert"), DrawOutcome::Drawn);
    assert_eq!(engine.snapshot().unwrap(), before);
}

#[tokio::test]
async fn tiny_scale_never_takes_the_engine_down() {
    let (tx, mut rx) = mpsc::channel(8);
    let mut engine = engine_with(EffectId::Blur).with_alerts(tx);
    assert_eq!(engine.image_loaded(loaded()), DrawOutcome::Drawn);

    // default blur spread is 12.5 / scale logical px
    assert_eq!(engine.set_scale(1e-30).unwrap(), DrawOutcome::Drawn);
    let (width, height) = engine.snapshot().unwrap().dimensions();
    assert!(width <= 25 && height <= 25, "{width}x{height}");

    assert_eq!(engine.set_scale(1e-39).unwrap(), DrawOutcome::Failed);
    assert_eq!(rx.try_recv().unwrap().kind, AlertKind::EffectFailed);

    assert_eq!(engine.reset_scale().unwrap(), DrawOutcome::Drawn);
    assert_eq!(engine.snapshot().unwrap().dimensions(), (40 + 25, 30 + 25));
}

#[tokio::test]
async fn failed_mosaic_pass_alerts_and_frees_the_controller() {
    let (tx, mut rx) = mpsc::channel(8);
    let mut engine = engine_with(EffectId::Invert).with_alerts(tx);
    engine.image_loaded(loaded());

    let surface = engine.surface();
    let poisoned = std::thread::spawn(move || {
        let _guard = surface.lock().unwrap();
        panic!("writer died holding the surface");
    })
    .join();
    assert!(poisoned.is_err());

    assert_eq!(engine.draw("mosaic"), DrawOutcome::Scheduled);
    assert_eq!(engine.settle().await, vec![DrawOutcome::Failed]);
    assert!(!engine.mosaic().is_running());
    let alert = rx.try_recv().unwrap();
    assert_eq!(alert.kind, AlertKind::MosaicFailed);
    assert!(alert.message.contains("poisoned"));
}
