//! Live-tunable stylization parameters.
//!
//! [`StylizeParams`] is the single source of truth for every knob the
//! composite and finishing passes read. Updates are pushed in, either through
//! a typed setter or through the name-based [`StylizeParams::apply`] dispatch
//! a tuning UI can drive, and become visible to the GPU the next time a pass
//! uploads its uniforms.
//!
//! No value is validated. The ranges in [`StylizeParams::SCHEMA`] describe
//! what a UI should offer; the pipeline renders whatever it is given, even
//! when that means a division by zero (`levels = 0`).

use std::fmt;

use crate::error::{Error, Result};

/// One named stylization parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Param {
    /// Halftone dot-screen frequency multiplier.
    Scale,
    /// Edge anti-aliasing width and halftone cell size.
    Thickness,
    /// Strength of the normal-gradient edge operator.
    Contour,
    /// Ink color, 0-255 per channel.
    InkColor,
    /// Luminance mapped to the darkest band.
    MinLuma,
    /// Luminance mapped to the brightest band.
    MaxLuma,
    /// How much of the bright range receives halftone dots.
    Light,
    /// Number of posterization steps.
    Levels,
    /// Radial channel offset of the finishing pass.
    AberrationDelta,
}

impl Param {
    pub const ALL: [Param; 9] = [
        Param::Scale,
        Param::Thickness,
        Param::Contour,
        Param::InkColor,
        Param::MinLuma,
        Param::MaxLuma,
        Param::Light,
        Param::Levels,
        Param::AberrationDelta,
    ];

    /// Canonical name, as accepted by [`Param::from_name`].
    pub fn name(self) -> &'static str {
        match self {
            Param::Scale => "scale",
            Param::Thickness => "thickness",
            Param::Contour => "contour",
            Param::InkColor => "inkColor",
            Param::MinLuma => "minLuma",
            Param::MaxLuma => "maxLuma",
            Param::Light => "light",
            Param::Levels => "levels",
            Param::AberrationDelta => "aberrationDelta",
        }
    }

    /// Look a parameter up by canonical name or by one of its short aliases.
    pub fn from_name(name: &str) -> Option<Param> {
        let param = match name {
            "scale" => Param::Scale,
            "thickness" => Param::Thickness,
            "contour" => Param::Contour,
            "inkColor" | "ink_color" | "ink" => Param::InkColor,
            "minLuma" | "min_luma" | "min" => Param::MinLuma,
            "maxLuma" | "max_luma" | "max" => Param::MaxLuma,
            "light" => Param::Light,
            "levels" => Param::Levels,
            "aberrationDelta" | "aberration_delta" | "aberration" | "delta" => {
                Param::AberrationDelta
            }
            _ => return None,
        };
        Some(param)
    }

    pub fn kind(self) -> ParamKind {
        match self {
            Param::InkColor => ParamKind::Color,
            _ => ParamKind::Scalar,
        }
    }

    /// UI range for this parameter.
    pub fn spec(self) -> &'static ParamSpec {
        StylizeParams::SCHEMA
            .iter()
            .find(|spec| spec.param == self)
            .unwrap_or(&StylizeParams::SCHEMA[0])
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamKind {
    Scalar,
    Color,
}

impl ParamKind {
    fn label(self) -> &'static str {
        match self {
            ParamKind::Scalar => "scalar",
            ParamKind::Color => "color",
        }
    }
}

/// A value pushed into a parameter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParamValue {
    Scalar(f32),
    /// RGB, 0-255 per channel.
    Color([f32; 3]),
}

impl ParamValue {
    pub fn kind(&self) -> ParamKind {
        match self {
            ParamValue::Scalar(_) => ParamKind::Scalar,
            ParamValue::Color(_) => ParamKind::Color,
        }
    }
}

impl From<f32> for ParamValue {
    fn from(value: f32) -> Self {
        ParamValue::Scalar(value)
    }
}

impl From<[f32; 3]> for ParamValue {
    fn from(rgb: [f32; 3]) -> Self {
        ParamValue::Color(rgb)
    }
}

impl From<[u8; 3]> for ParamValue {
    fn from(rgb: [u8; 3]) -> Self {
        ParamValue::Color(rgb.map(f32::from))
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Scalar(v) => write!(f, "{v:.3}"),
            ParamValue::Color([r, g, b]) => write!(f, "rgb({r:.0}, {g:.0}, {b:.0})"),
        }
    }
}

/// Range and step a tuning UI should expose for one parameter.
///
/// Color parameters ignore `min`/`max`/`step` beyond the 0-255 channel range.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParamSpec {
    pub param: Param,
    pub min: f32,
    pub max: f32,
    pub step: f32,
}

impl ParamSpec {
    const fn new(param: Param, min: f32, max: f32, step: f32) -> Self {
        Self {
            param,
            min,
            max,
            step,
        }
    }

    /// Move `value` by `steps` UI steps, staying inside the range.
    ///
    /// Colors move every channel together, eight steps at a time.
    pub fn nudge(&self, value: ParamValue, steps: i32) -> ParamValue {
        match value {
            ParamValue::Scalar(v) => {
                ParamValue::Scalar((v + steps as f32 * self.step).clamp(self.min, self.max))
            }
            ParamValue::Color(rgb) => {
                let delta = 8.0 * steps as f32 * self.step;
                ParamValue::Color(rgb.map(|c| (c + delta).clamp(self.min, self.max)))
            }
        }
    }
}

/// The complete stylization parameter set.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StylizeParams {
    pub scale: f32,
    pub thickness: f32,
    pub contour: f32,
    /// RGB, 0-255 per channel.
    pub ink_color: [f32; 3],
    pub min_luma: f32,
    pub max_luma: f32,
    pub light: f32,
    pub levels: f32,
    pub aberration_delta: f32,
}

impl Default for StylizeParams {
    fn default() -> Self {
        Self {
            scale: 1.5,
            thickness: 1.0,
            contour: 4.0,
            ink_color: [13.0, 13.0, 13.0],
            min_luma: 0.3,
            max_luma: 1.0,
            light: 0.38,
            levels: 100.0,
            aberration_delta: 20.0,
        }
    }
}

impl StylizeParams {
    /// UI ranges, in the order a tuning panel lists them.
    pub const SCHEMA: [ParamSpec; 9] = [
        ParamSpec::new(Param::Levels, 1.0, 100.0, 1.0),
        ParamSpec::new(Param::Scale, 0.1, 2.0, 0.01),
        ParamSpec::new(Param::Thickness, 0.0, 3.0, 0.01),
        ParamSpec::new(Param::Contour, 0.0, 10.0, 0.1),
        ParamSpec::new(Param::MinLuma, 0.0, 1.0, 0.01),
        ParamSpec::new(Param::MaxLuma, 0.0, 1.0, 0.01),
        ParamSpec::new(Param::Light, 0.0, 1.0, 0.01),
        ParamSpec::new(Param::AberrationDelta, 0.0, 100.0, 0.1),
        ParamSpec::new(Param::InkColor, 0.0, 255.0, 1.0),
    ];

    pub fn get(&self, param: Param) -> ParamValue {
        match param {
            Param::Scale => self.scale.into(),
            Param::Thickness => self.thickness.into(),
            Param::Contour => self.contour.into(),
            Param::InkColor => self.ink_color.into(),
            Param::MinLuma => self.min_luma.into(),
            Param::MaxLuma => self.max_luma.into(),
            Param::Light => self.light.into(),
            Param::Levels => self.levels.into(),
            Param::AberrationDelta => self.aberration_delta.into(),
        }
    }

    /// Write one parameter. Fails only if the value kind does not match.
    pub fn apply(&mut self, param: Param, value: ParamValue) -> Result<()> {
        let mismatch = || Error::ParameterType {
            name: param.name(),
            expected: param.kind().label(),
        };

        match (param, value) {
            (Param::InkColor, ParamValue::Color(rgb)) => self.ink_color = rgb,
            (Param::InkColor, ParamValue::Scalar(_)) => return Err(mismatch()),
            (_, ParamValue::Color(_)) => return Err(mismatch()),
            (_, ParamValue::Scalar(v)) => *self.scalar_mut(param).ok_or_else(mismatch)? = v,
        }
        Ok(())
    }

    /// Write a parameter by name, as a tuning UI callback would.
    pub fn apply_named(&mut self, name: &str, value: ParamValue) -> Result<Param> {
        let param = Param::from_name(name).ok_or_else(|| Error::UnknownParameter(name.into()))?;
        self.apply(param, value)?;
        Ok(param)
    }

    fn scalar_mut(&mut self, param: Param) -> Option<&mut f32> {
        let slot = match param {
            Param::Scale => &mut self.scale,
            Param::Thickness => &mut self.thickness,
            Param::Contour => &mut self.contour,
            Param::MinLuma => &mut self.min_luma,
            Param::MaxLuma => &mut self.max_luma,
            Param::Light => &mut self.light,
            Param::Levels => &mut self.levels,
            Param::AberrationDelta => &mut self.aberration_delta,
            Param::InkColor => return None,
        };
        Some(slot)
    }

    /// Ink color normalized to 0..1.
    pub fn ink_rgb(&self) -> [f32; 3] {
        self.ink_color.map(|c| c / 255.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_look() {
        let p = StylizeParams::default();
        assert_eq!(p.scale, 1.5);
        assert_eq!(p.thickness, 1.0);
        assert_eq!(p.contour, 4.0);
        assert_eq!(p.ink_color, [13.0, 13.0, 13.0]);
        assert_eq!((p.min_luma, p.max_luma), (0.3, 1.0));
        assert_eq!(p.light, 0.38);
        assert_eq!(p.levels, 100.0);
        assert_eq!(p.aberration_delta, 20.0);
    }

    #[test]
    fn every_param_round_trips_through_its_name() {
        for param in Param::ALL {
            assert_eq!(Param::from_name(param.name()), Some(param));
        }
    }

    #[test]
    fn aliases_resolve() {
        assert_eq!(Param::from_name("min"), Some(Param::MinLuma));
        assert_eq!(Param::from_name("max"), Some(Param::MaxLuma));
        assert_eq!(Param::from_name("aberration"), Some(Param::AberrationDelta));
        assert_eq!(Param::from_name("ink_color"), Some(Param::InkColor));
        assert_eq!(Param::from_name("gamma"), None);
    }

    #[test]
    fn apply_writes_only_the_named_field() {
        let mut p = StylizeParams::default();
        p.apply(Param::Levels, 4.0.into()).unwrap();

        let expected = StylizeParams {
            levels: 4.0,
            ..StylizeParams::default()
        };
        assert_eq!(p, expected);
        assert_eq!(p.get(Param::Levels), ParamValue::Scalar(4.0));
    }

    #[test]
    fn apply_named_sets_ink_color() {
        let mut p = StylizeParams::default();
        let param = p.apply_named("inkColor", [200u8, 10, 0].into()).unwrap();
        assert_eq!(param, Param::InkColor);
        assert_eq!(p.ink_color, [200.0, 10.0, 0.0]);
        assert!((p.ink_rgb()[0] - 200.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn apply_rejects_mismatched_kinds() {
        let mut p = StylizeParams::default();
        assert!(matches!(
            p.apply(Param::InkColor, 1.0.into()),
            Err(Error::ParameterType { name: "inkColor", .. })
        ));
        assert!(matches!(
            p.apply(Param::Scale, [1.0, 1.0, 1.0].into()),
            Err(Error::ParameterType { name: "scale", .. })
        ));
        assert_eq!(p, StylizeParams::default());
    }

    #[test]
    fn apply_named_rejects_unknown_names() {
        let mut p = StylizeParams::default();
        let err = p.apply_named("exposure", 1.0.into()).unwrap_err();
        assert!(matches!(err, Error::UnknownParameter(name) if name == "exposure"));
    }

    #[test]
    fn degenerate_values_are_accepted() {
        let mut p = StylizeParams::default();
        p.apply(Param::Levels, 0.0.into()).unwrap();
        p.apply(Param::Thickness, (-1.0).into()).unwrap();
        assert_eq!(p.levels, 0.0);
        assert_eq!(p.thickness, -1.0);
    }

    #[test]
    fn schema_covers_every_param_once() {
        for param in Param::ALL {
            let count = StylizeParams::SCHEMA
                .iter()
                .filter(|spec| spec.param == param)
                .count();
            assert_eq!(count, 1, "{param} listed {count} times");
            assert_eq!(param.spec().param, param);
        }
    }

    #[test]
    fn nudge_steps_and_clamps() {
        let levels = Param::Levels.spec();
        assert_eq!(levels.nudge(4.0.into(), 1), ParamValue::Scalar(5.0));
        assert_eq!(levels.nudge(1.0.into(), -3), ParamValue::Scalar(1.0));
        assert_eq!(levels.nudge(100.0.into(), 1), ParamValue::Scalar(100.0));

        let ink = Param::InkColor.spec();
        assert_eq!(
            ink.nudge([250.0, 13.0, 0.0].into(), 1),
            ParamValue::Color([255.0, 21.0, 8.0])
        );
    }

    #[test]
    fn defaults_fall_inside_schema_ranges() {
        let p = StylizeParams::default();
        for spec in StylizeParams::SCHEMA {
            if let ParamValue::Scalar(v) = p.get(spec.param) {
                assert!((spec.min..=spec.max).contains(&v), "{} = {v}", spec.param);
            }
        }
    }
}
