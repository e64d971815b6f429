use serde::{Deserialize, Serialize};

use crate::sliders::{ControlId, SliderSync};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Bilateral filter sigmas.
pub struct Denoise {
    pub sigma_space: f64,
    pub sigma_color: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Per-channel gains for gray-world white balance.
pub struct WhiteBalance {
    pub r_gain: f64,
    pub g_gain: f64,
    pub b_gain: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// CLAHE contrast parameters.
pub struct Contrast {
    pub clip_limit: f64,
    pub tile_grid_size: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Saturation {
    pub percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Unsharp mask parameters; `amount` is a percentage.
pub struct Sharpen {
    pub radius: f64,
    pub amount: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Parameters sent with a manual enhancement request.
pub struct EnhancementParameters {
    pub denoise: Denoise,
    pub white_balance: WhiteBalance,
    pub contrast: Contrast,
    pub saturation: Saturation,
    pub sharpen: Sharpen,
}

impl Default for EnhancementParameters {
    fn default() -> Self {
        ParameterCollector::new(&SliderSync::new()).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
/// Parameters the server reports after an automatic enhancement.
pub struct ParamsUsed {
    pub sigma_space: Option<f64>,
    pub sigma_color: Option<f64>,
    pub r_gain: Option<f64>,
    pub g_gain: Option<f64>,
    pub b_gain: Option<f64>,
    pub clip_limit: Option<f64>,
    #[serde(alias = "tile_grid_size")]
    pub tile_grid: Option<f64>,
    pub saturation: Option<f64>,
    pub sharpen_radius: Option<f64>,
    pub sharpen_amount: Option<f64>,
}

impl ParamsUsed {
    /// Reported values in canonical group order: denoise, white balance,
    /// contrast, saturation, sharpen.
    pub fn entries(&self) -> Vec<(ControlId, f64)> {
        [
            (ControlId::SigmaSpace, self.sigma_space),
            (ControlId::SigmaColor, self.sigma_color),
            (ControlId::RGain, self.r_gain),
            (ControlId::GGain, self.g_gain),
            (ControlId::BGain, self.b_gain),
            (ControlId::ClipLimit, self.clip_limit),
            (ControlId::TileGridSize, self.tile_grid),
            (ControlId::Saturation, self.saturation),
            (ControlId::SharpenRadius, self.sharpen_radius),
            (ControlId::SharpenAmount, self.sharpen_amount),
        ]
        .into_iter()
        .filter_map(|(id, v)| v.map(|v| (id, v)))
        .collect()
    }
}

/// Reads the current control values into a request payload.
///
/// The controls own range enforcement, so nothing is validated here beyond
/// turning text into numbers.
pub struct ParameterCollector<'a> {
    sliders: &'a SliderSync,
}

impl<'a> ParameterCollector<'a> {
    pub fn new(sliders: &'a SliderSync) -> Self {
        Self { sliders }
    }

    pub fn collect(&self) -> EnhancementParameters {
        EnhancementParameters {
            denoise: Denoise {
                sigma_space: self.float(ControlId::SigmaSpace),
                sigma_color: self.float(ControlId::SigmaColor),
            },
            white_balance: WhiteBalance {
                r_gain: self.float(ControlId::RGain),
                g_gain: self.float(ControlId::GGain),
                b_gain: self.float(ControlId::BGain),
            },
            contrast: Contrast {
                clip_limit: self.float(ControlId::ClipLimit),
                tile_grid_size: self.whole(ControlId::TileGridSize),
            },
            saturation: Saturation {
                percentage: self.whole(ControlId::Saturation),
            },
            sharpen: Sharpen {
                radius: self.float(ControlId::SharpenRadius),
                amount: self.whole(ControlId::SharpenAmount),
            },
        }
    }

    fn float(&self, control: ControlId) -> f64 {
        parse_or_default(control, self.sliders.value(control))
    }

    // Integer fields drop the fractional part, so "110.00" reads as 110.
    fn whole(&self, control: ControlId) -> u32 {
        parse_or_default(control, self.sliders.value(control))
            .trunc()
            .max(0.0) as u32
    }
}

fn parse_or_default(control: ControlId, raw: &str) -> f64 {
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => {
            let fallback = control.spec().default;
            tracing::warn!(
                control = control.as_str(),
                raw,
                fallback,
                "control value is not numeric; using default"
            );
            fallback.parse().unwrap_or(0.0)
        }
    }
}
