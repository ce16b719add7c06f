use crate::effects::{non_negative, Effect, EffectId};
use crate::error::Result;
use crate::processing::filters::ColorFilter;
use crate::surface::Surface;

/// The seven effects that apply one colour filter without touching geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Brightness,
    Contrast,
    Grayscale,
    HueRotate,
    Invert,
    Opacity,
    Saturate,
}

impl FilterKind {
    pub fn id(&self) -> EffectId {
        match self {
            Self::Brightness => EffectId::Brightness,
            Self::Contrast => EffectId::Contrast,
            Self::Grayscale => EffectId::Grayscale,
            Self::HueRotate => EffectId::HueRotate,
            Self::Invert => EffectId::Invert,
            Self::Opacity => EffectId::Opacity,
            Self::Saturate => EffectId::Saturate,
        }
    }

    fn parameter(&self) -> &'static str {
        match self {
            Self::Brightness => "amount",
            Self::HueRotate => "degrees",
            _ => "percent",
        }
    }
}

/// Brightness is a multiplier, hue rotation is in degrees and every other
/// kind takes a percentage.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterEffect {
    kind: FilterKind,
    pub amount: f32,
}

impl FilterEffect {
    pub fn new(kind: FilterKind, amount: f32) -> Self {
        Self { kind, amount }
    }

    fn color_filter(&self) -> ColorFilter {
        match self.kind {
            FilterKind::Brightness => ColorFilter::Brightness(self.amount),
            FilterKind::Contrast => ColorFilter::Contrast(self.amount),
            FilterKind::Grayscale => ColorFilter::Grayscale(self.amount),
            FilterKind::HueRotate => ColorFilter::HueRotate(self.amount),
            FilterKind::Invert => ColorFilter::Invert(self.amount),
            FilterKind::Opacity => ColorFilter::Opacity(self.amount),
            FilterKind::Saturate => ColorFilter::Saturate(self.amount),
        }
    }
}

impl Effect for FilterEffect {
    fn id(&self) -> EffectId {
        self.kind.id()
    }

    fn validate(&self) -> Result<()> {
        non_negative(self.id(), self.kind.parameter(), self.amount)
    }

    fn render(&self, surface: &mut Surface, overlap: bool) -> Result<()> {
        let scaled = surface.scaled_source()?;
        let mut filtered = (*scaled).clone();
        self.color_filter().apply(&mut filtered);
        if !overlap {
            surface.clear();
        }
        surface.composite(&filtered, 0, 0);
        Ok(())
    }
}
