//! Effect dispatch and surface ownership.
//!
//! The engine remembers the last applied effect and the loaded image name,
//! routes mosaic requests to the async controller and draws every other
//! effect synchronously. Failures are logged and reported as [`UserAlert`]s;
//! nothing a draw does can take the host down.
//!
//! Mosaic passes are spawned on the tokio runtime the drawing method is
//! called from. Without one, a mosaic request reports
//! [`DrawOutcome::Failed`] and the other effects still draw.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::RgbaImage;
use tokio::runtime::Handle;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::effects::{DrawOutcome, EffectId, EffectSet};
use crate::error::{Error, Result};
use crate::events::{AlertKind, LoadedImage, UserAlert};
use crate::surface::{lock_surface, SharedSurface, Surface};
use crate::tasks::loader;
use crate::tasks::mosaic::{MosaicController, MosaicSchedule};

const DEFAULT_EXPORT_NAME: &str = "image.png";

pub struct Engine {
    surface: SharedSurface,
    effects: EffectSet,
    mosaic: MosaicController,
    shutdown: CancellationToken,
    last_effect: EffectId,
    image_name: Option<String>,
    alerts: Option<Sender<UserAlert>>,
    passes: JoinSet<DrawOutcome>,
}

impl Engine {
    pub fn new(effects: EffectSet, schedule: MosaicSchedule, scale: f32) -> Result<Self> {
        let shutdown = CancellationToken::new();
        Ok(Self {
            surface: Surface::new(scale)?.shared(),
            effects,
            mosaic: MosaicController::new(schedule, shutdown.clone()),
            shutdown,
            last_effect: EffectId::Mosaic,
            image_name: None,
            alerts: None,
            passes: JoinSet::new(),
        })
    }

    /// Sends alerts to `tx`. Alerts are dropped when the channel is full.
    pub fn with_alerts(mut self, tx: Sender<UserAlert>) -> Self {
        self.alerts = Some(tx);
        self
    }

    /// Effect drawn when the first image arrives.
    pub fn with_initial_effect(mut self, effect: EffectId) -> Self {
        self.last_effect = effect;
        self
    }

    pub fn surface(&self) -> SharedSurface {
        Arc::clone(&self.surface)
    }

    pub fn effects(&self) -> &EffectSet {
        &self.effects
    }

    /// Parameters take effect on the next draw.
    pub fn effects_mut(&mut self) -> &mut EffectSet {
        &mut self.effects
    }

    pub fn mosaic(&self) -> &MosaicController {
        &self.mosaic
    }

    pub fn last_effect(&self) -> EffectId {
        self.last_effect
    }

    pub fn image_name(&self) -> Option<&str> {
        self.image_name.as_deref()
    }

    /// Draws the named effect, clearing stale pixels first. A mosaic is only
    /// scheduled here and needs a tokio runtime.
    pub fn draw(&mut self, effect: &str) -> DrawOutcome {
        match self.parse_effect(effect) {
            Some(id) => self.draw_effect(id, false),
            None => DrawOutcome::Skipped,
        }
    }

    /// Replays the last applied effect.
    pub fn draw_last(&mut self) -> DrawOutcome {
        self.draw_effect(self.last_effect, false)
    }

    /// Switches effect: the buffer is refitted to the image before drawing.
    pub fn select_effect(&mut self, effect: &str) -> DrawOutcome {
        let Some(id) = self.parse_effect(effect) else {
            return DrawOutcome::Skipped;
        };
        if let Err(err) = self.refit() {
            debug!(error = %err, "nothing to refit");
        }
        self.draw_effect(id, false)
    }

    /// Rescales and replays the last effect on the refitted buffer.
    pub fn set_scale(&mut self, scale: f32) -> Result<DrawOutcome> {
        {
            let mut surface = lock_surface(&self.surface)?;
            surface.set_scale(scale)?;
            if surface.is_displayable() {
                surface.resize_to_source()?;
            }
        }
        info!(scale, "scale changed");
        Ok(self.draw_effect(self.last_effect, true))
    }

    pub fn reset_scale(&mut self) -> Result<DrawOutcome> {
        self.set_scale(1.0)
    }

    /// Installs a decoded image and replays the last effect on it.
    pub fn image_loaded(&mut self, loaded: LoadedImage) -> DrawOutcome {
        info!(name = %loaded.name, "image loaded");
        let installed = lock_surface(&self.surface).and_then(|mut surface| {
            surface.set_source(loaded.image);
            surface.resize_to_source()
        });
        if let Err(err) = installed {
            error!(error = %err, "failed to install image");
            self.alert(AlertKind::LoadFailed, format!("could not show {}: {err}", loaded.name));
            return DrawOutcome::Failed;
        }
        self.image_name = Some(loaded.name);
        self.draw_effect(self.last_effect, false)
    }

    /// Hides the current image and tells the user.
    pub fn image_failed(&mut self, name: &str, err: &Error) {
        self.mosaic.request_cancel();
        if let Ok(mut surface) = lock_surface(&self.surface) {
            surface.mark_unavailable();
        }
        error!(%name, error = %err, "image load failed");
        self.alert(AlertKind::LoadFailed, format!("could not load {name}: {err}"));
    }

    /// Loads `path` and draws the last effect on it. The surface is not
    /// displayable while the decode runs.
    pub async fn load_path(&mut self, path: impl AsRef<Path>) -> DrawOutcome {
        let path: PathBuf = path.as_ref().to_path_buf();
        self.mosaic.request_cancel();
        if let Ok(mut surface) = lock_surface(&self.surface) {
            surface.mark_unavailable();
        }
        match loader::load(path.clone()).await {
            Ok(loaded) => self.image_loaded(loaded),
            Err(err) => {
                self.image_failed(&path.display().to_string(), &err);
                DrawOutcome::Failed
            }
        }
    }

    /// Copy of the buffer as of the last completed draw.
    pub fn snapshot(&self) -> Result<RgbaImage> {
        Ok(lock_surface(&self.surface)?.buffer().clone())
    }

    pub fn encode_png(&self) -> Result<Vec<u8>> {
        lock_surface(&self.surface)?.encode_png()
    }

    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let saved = lock_surface(&self.surface).and_then(|surface| surface.save_png(path));
        if let Err(err) = &saved {
            error!(path = %path.display(), error = %err, "export failed");
            self.alert(AlertKind::ExportFailed, format!("could not export {}: {err}", path.display()));
        }
        saved
    }

    /// Loaded image name with a `.png` extension.
    pub fn export_file_name(&self) -> String {
        match self.image_name.as_deref().map(Path::new) {
            Some(name) => match name.file_stem() {
                Some(stem) if !stem.is_empty() => format!("{}.png", stem.to_string_lossy()),
                _ => DEFAULT_EXPORT_NAME.to_string(),
            },
            None => DEFAULT_EXPORT_NAME.to_string(),
        }
    }

    /// Waits for every scheduled mosaic request. Outcomes are in completion
    /// order.
    pub async fn settle(&mut self) -> Vec<DrawOutcome> {
        let mut outcomes = Vec::new();
        while let Some(joined) = self.passes.join_next().await {
            outcomes.push(self.joined(joined));
        }
        outcomes
    }

    /// Cancels pending mosaic work and waits for it to wind down.
    pub async fn shutdown(&mut self) {
        self.shutdown.cancel();
        self.settle().await;
    }

    fn parse_effect(&self, raw: &str) -> Option<EffectId> {
        match raw.parse::<EffectId>() {
            Ok(id) => Some(id),
            Err(err) => {
                warn!(effect = raw, "unknown effect requested");
                self.alert(AlertKind::UnknownEffect, err.to_string());
                None
            }
        }
    }

    fn refit(&self) -> Result<()> {
        let mut surface = lock_surface(&self.surface)?;
        if !surface.is_displayable() {
            return Err(Error::NotDisplayable);
        }
        surface.resize_to_source()
    }

    fn draw_effect(&mut self, id: EffectId, overlap: bool) -> DrawOutcome {
        self.last_effect = id;
        self.reap();
        if id == EffectId::Mosaic {
            return self.schedule_mosaic(overlap);
        }

        self.mosaic.request_cancel();
        let drawn = lock_surface(&self.surface)
            .and_then(|mut surface| self.effects.get(id).draw(&mut surface, overlap));
        match drawn {
            Ok(outcome) => {
                debug!(effect = %id, ?outcome, "draw finished");
                outcome
            }
            Err(err) => {
                error!(effect = %id, error = %err, "effect failed");
                self.alert(AlertKind::EffectFailed, format!("{id} failed: {err}"));
                DrawOutcome::Failed
            }
        }
    }

    fn schedule_mosaic(&mut self, overlap: bool) -> DrawOutcome {
        let Ok(runtime) = Handle::try_current() else {
            error!("mosaic requested outside a tokio runtime");
            self.alert(AlertKind::MosaicFailed, "mosaic needs a running tokio runtime".to_string());
            return DrawOutcome::Failed;
        };
        let ticket = self.mosaic.request_cancel();
        let controller = self.mosaic.clone();
        let surface = Arc::clone(&self.surface);
        let effect = self.effects.mosaic.clone();
        let alerts = self.alerts.clone();
        let pass = async move {
            match controller
                .draw_with_ticket(ticket, &surface, &effect, overlap)
                .await
            {
                Ok(outcome) => outcome,
                Err(err) => {
                    send_alert(
                        alerts.as_ref(),
                        AlertKind::MosaicFailed,
                        format!("mosaic failed: {err}"),
                    );
                    DrawOutcome::Failed
                }
            }
        };
        self.passes.spawn_on(pass, &runtime);
        DrawOutcome::Scheduled
    }

    /// Drops finished passes so the join set does not grow without bound.
    fn reap(&mut self) {
        while let Some(joined) = self.passes.try_join_next() {
            let outcome = self.joined(joined);
            debug!(?outcome, "mosaic request finished");
        }
    }

    fn joined(&self, joined: std::result::Result<DrawOutcome, tokio::task::JoinError>) -> DrawOutcome {
        joined.unwrap_or_else(|err| {
            error!(error = %err, "mosaic task aborted");
            self.alert(AlertKind::MosaicFailed, format!("mosaic task aborted: {err}"));
            DrawOutcome::Failed
        })
    }

    fn alert(&self, kind: AlertKind, message: String) {
        send_alert(self.alerts.as_ref(), kind, message);
    }
}

fn send_alert(alerts: Option<&Sender<UserAlert>>, kind: AlertKind, message: String) {
    let Some(tx) = alerts else {
        return;
    };
    if let Err(err) = tx.try_send(UserAlert { kind, message }) {
        warn!(error = %err, "user alert dropped");
    }
}
