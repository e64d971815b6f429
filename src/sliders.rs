//! Numeric controls for manual enhancement and their text readouts.
//!
//! Each control stores its value the way a form input does: as text, clamped
//! to the control's range. A bound label always reads `value + unit`.

use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ControlId {
    SigmaSpace,
    SigmaColor,
    RGain,
    GGain,
    BGain,
    ClipLimit,
    TileGridSize,
    Saturation,
    SharpenRadius,
    SharpenAmount,
}

/// Range, step and default of a control.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ControlSpec {
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub decimals: usize,
    pub default: &'static str,
}

impl ControlId {
    pub const ALL: [ControlId; 10] = [
        ControlId::SigmaSpace,
        ControlId::SigmaColor,
        ControlId::RGain,
        ControlId::GGain,
        ControlId::BGain,
        ControlId::ClipLimit,
        ControlId::TileGridSize,
        ControlId::Saturation,
        ControlId::SharpenRadius,
        ControlId::SharpenAmount,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ControlId::SigmaSpace => "sigma_space",
            ControlId::SigmaColor => "sigma_color",
            ControlId::RGain => "r_gain",
            ControlId::GGain => "g_gain",
            ControlId::BGain => "b_gain",
            ControlId::ClipLimit => "clip_limit",
            ControlId::TileGridSize => "tile_grid_size",
            ControlId::Saturation => "saturation",
            ControlId::SharpenRadius => "sharpen_radius",
            ControlId::SharpenAmount => "sharpen_amount",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            ControlId::SigmaSpace => "Sigma space",
            ControlId::SigmaColor => "Sigma color",
            ControlId::RGain => "Red gain",
            ControlId::GGain => "Green gain",
            ControlId::BGain => "Blue gain",
            ControlId::ClipLimit => "Clip limit",
            ControlId::TileGridSize => "Tile grid",
            ControlId::Saturation => "Saturation",
            ControlId::SharpenRadius => "Radius",
            ControlId::SharpenAmount => "Amount",
        }
    }

    pub fn spec(self) -> ControlSpec {
        let (min, max, step, decimals, default) = match self {
            ControlId::SigmaSpace => (0.0, 20.0, 1.0, 0, "3"),
            ControlId::SigmaColor => (0.0, 150.0, 1.0, 0, "60"),
            ControlId::RGain | ControlId::GGain | ControlId::BGain => (0.5, 2.0, 0.01, 2, "1.00"),
            ControlId::ClipLimit => (0.5, 10.0, 0.1, 1, "2.0"),
            ControlId::TileGridSize => (1.0, 16.0, 1.0, 0, "8"),
            ControlId::Saturation => (0.0, 200.0, 1.0, 0, "110"),
            ControlId::SharpenRadius => (0.1, 5.0, 0.1, 1, "1.0"),
            ControlId::SharpenAmount => (0.0, 200.0, 1.0, 0, "100"),
        };
        ControlSpec {
            min,
            max,
            step,
            decimals,
            default,
        }
    }
}

impl ControlSpec {
    /// Sanitizes an assigned value: non-numbers become the default, numbers
    /// outside the range are clamped. In-range text is kept verbatim.
    pub fn sanitize(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        match trimmed.parse::<f64>() {
            Ok(v) if v.is_finite() && v >= self.min && v <= self.max => trimmed.to_string(),
            Ok(v) if v.is_finite() => self.format(v.clamp(self.min, self.max)),
            _ => self.default.to_string(),
        }
    }

    pub fn format(&self, value: f64) -> String {
        format!("{:.*}", self.decimals, value)
    }
}

/// Pairs a control with the label that mirrors it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SliderBinding {
    pub control: ControlId,
    pub label_id: &'static str,
    pub unit: Option<&'static str>,
}

pub const BINDINGS: [SliderBinding; 10] = [
    binding(ControlId::SigmaSpace, "sigma_space_val", None),
    binding(ControlId::SigmaColor, "sigma_color_val", None),
    binding(ControlId::RGain, "r_gain_val", None),
    binding(ControlId::GGain, "g_gain_val", None),
    binding(ControlId::BGain, "b_gain_val", None),
    binding(ControlId::ClipLimit, "clip_limit_val", None),
    binding(ControlId::TileGridSize, "tile_grid_size_val", None),
    binding(ControlId::Saturation, "saturation_val", Some("%")),
    binding(ControlId::SharpenRadius, "sharpen_radius_val", Some(" px")),
    binding(ControlId::SharpenAmount, "sharpen_amount_val", Some("%")),
];

const fn binding(
    control: ControlId,
    label_id: &'static str,
    unit: Option<&'static str>,
) -> SliderBinding {
    SliderBinding {
        control,
        label_id,
        unit,
    }
}

struct Label {
    id: &'static str,
    unit: &'static str,
    text: String,
}

pub struct SliderSync {
    values: HashMap<ControlId, String>,
    labels: HashMap<ControlId, Label>,
}

impl SliderSync {
    /// All controls at their defaults, no labels bound yet.
    pub fn new() -> Self {
        let values = ControlId::ALL
            .iter()
            .map(|&id| (id, id.spec().default.to_string()))
            .collect();
        Self {
            values,
            labels: HashMap::new(),
        }
    }

    /// Controls bound according to [`BINDINGS`].
    pub fn with_default_bindings() -> Self {
        let mut sync = Self::new();
        for b in BINDINGS {
            sync.bind(b.control, b.label_id, b.unit);
        }
        sync
    }

    /// Registers the label for `control` and shows the current value in it.
    pub fn bind(&mut self, control: ControlId, label_id: &'static str, unit: Option<&'static str>) {
        let mut label = Label {
            id: label_id,
            unit: unit.unwrap_or(""),
            text: String::new(),
        };
        label.text = format!("{}{}", self.value(control), label.unit);
        self.labels.insert(control, label);
    }

    /// User input event. Runs on every tick; there is no debouncing.
    pub fn input(&mut self, control: ControlId, raw: &str) {
        self.assign(control, raw);
    }

    /// Programmatic update, e.g. from parameters the server reports back.
    pub fn set(&mut self, control: ControlId, value: &str) {
        tracing::debug!(control = control.as_str(), value, "slider set");
        self.assign(control, value);
    }

    pub fn reset(&mut self, control: ControlId) {
        self.assign(control, control.spec().default);
    }

    pub fn reset_all(&mut self) {
        for id in ControlId::ALL {
            self.reset(id);
        }
    }

    pub fn value(&self, control: ControlId) -> &str {
        self.values
            .get(&control)
            .map(String::as_str)
            .unwrap_or(control.spec().default)
    }

    pub fn label(&self, control: ControlId) -> Option<&str> {
        self.labels.get(&control).map(|l| l.text.as_str())
    }

    pub fn label_id(&self, control: ControlId) -> Option<&'static str> {
        self.labels.get(&control).map(|l| l.id)
    }

    fn assign(&mut self, control: ControlId, raw: &str) {
        let value = control.spec().sanitize(raw);
        if let Some(label) = self.labels.get_mut(&control) {
            label.text = format!("{}{}", value, label.unit);
        }
        self.values.insert(control, value);
    }
}

impl Default for SliderSync {
    fn default() -> Self {
        Self::with_default_bindings()
    }
}
