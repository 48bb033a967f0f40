use crate::color::Color;
use crate::params::StylizeParams;

/// Default paper tiling factor: paper UV = `paper_scale * pixel`.
pub const DEFAULT_PAPER_SCALE: f32 = 0.00025;

/// Construction-time settings for a [`Stylizer`](crate::Stylizer).
///
/// # Example
///
/// ```
/// use inkpost::{Color, StylizerConfig, StylizeParams};
///
/// let config = StylizerConfig::new()
///     .finishing(true)
///     .background(Color::rgb(0.9, 0.9, 0.9))
///     .params(StylizeParams {
///         levels: 4.0,
///         ..Default::default()
///     });
/// assert!(config.finishing);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StylizerConfig {
    /// Run the chromatic aberration / desaturation stage after the composite.
    pub finishing: bool,
    pub params: StylizeParams,
    pub paper_scale: f32,
    /// Clear color of the scene color capture.
    pub background: Color,
}

impl Default for StylizerConfig {
    fn default() -> Self {
        Self {
            finishing: false,
            params: StylizeParams::default(),
            paper_scale: DEFAULT_PAPER_SCALE,
            background: Color::WHITE,
        }
    }
}

impl StylizerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finishing(mut self, enabled: bool) -> Self {
        self.finishing = enabled;
        self
    }

    pub fn params(mut self, params: StylizeParams) -> Self {
        self.params = params;
        self
    }

    pub fn paper_scale(mut self, scale: f32) -> Self {
        self.paper_scale = scale;
        self
    }

    pub fn background(mut self, color: Color) -> Self {
        self.background = color;
        self
    }
}
