use serde::{Deserialize, Serialize};

use crate::error::{Result, SegmentError};

/// Number of entries in a [`ParameterVector`].
pub const PARAM_COUNT: usize = 10;

/// Vectors persisted before the border flag existed carry nine entries.
pub const LEGACY_PARAM_COUNT: usize = 9;

/// One entry of the parameter vector, in on-disk order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Param {
    ClipLimit,
    BackgroundRadius,
    SmoothRadius,
    Threshold,
    MinObjectSize,
    CenterWeight,
    MinSeparation,
    EdgeBlurRadius,
    WatershedRatio,
    ExcludeBorder,
}

impl Param {
    pub const ALL: [Param; PARAM_COUNT] = [
        Param::ClipLimit,
        Param::BackgroundRadius,
        Param::SmoothRadius,
        Param::Threshold,
        Param::MinObjectSize,
        Param::CenterWeight,
        Param::MinSeparation,
        Param::EdgeBlurRadius,
        Param::WatershedRatio,
        Param::ExcludeBorder,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Param> {
        Self::ALL.get(index).copied()
    }

    pub fn from_name(name: &str) -> Option<Param> {
        Self::ALL.iter().copied().find(|p| p.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Param::ClipLimit => "clip_limit",
            Param::BackgroundRadius => "bg_radius",
            Param::SmoothRadius => "smooth_radius",
            Param::Threshold => "threshold",
            Param::MinObjectSize => "min_object_size",
            Param::CenterWeight => "center_weight",
            Param::MinSeparation => "min_separation",
            Param::EdgeBlurRadius => "edge_blur_radius",
            Param::WatershedRatio => "watershed_ratio",
            Param::ExcludeBorder => "exclude_border",
        }
    }

    /// Tuning range for an interactive control bound to this entry.
    ///
    /// The ranges are advisory: validation only enforces the hard constraints
    /// (non-negative radii, unit-interval weights, boolean flag).
    pub fn spec(self) -> ParameterSpec {
        let (min, max, step) = match self {
            // The clipping ceiling is bounded by the channel's own intensity range.
            Param::ClipLimit => (0.0, None, 0.0),
            Param::BackgroundRadius => (0.0, Some(300.0), 5.0),
            Param::SmoothRadius => (0.0, Some(10.0), 1.0),
            Param::Threshold => (0.0, Some(1.0), 0.01),
            Param::MinObjectSize => (0.0, Some(200.0), 10.0),
            Param::CenterWeight => (0.0, Some(1.0), 0.05),
            Param::MinSeparation => (5.0, Some(50.0), 2.0),
            Param::EdgeBlurRadius => (0.0, Some(10.0), 1.0),
            Param::WatershedRatio => (0.0, Some(1.0), 0.05),
            Param::ExcludeBorder => (0.0, Some(1.0), 1.0),
        };
        ParameterSpec {
            param: self,
            min,
            max,
            step,
        }
    }

    fn check(self, value: f32) -> Result<()> {
        let invalid = |reason| SegmentError::InvalidParameter {
            index: self.index(),
            name: self.name(),
            value,
            reason,
        };

        if !value.is_finite() {
            return Err(invalid("must be finite"));
        }

        match self {
            Param::Threshold => Ok(()),
            Param::CenterWeight | Param::WatershedRatio => {
                if (0.0..=1.0).contains(&value) {
                    Ok(())
                } else {
                    Err(invalid("must lie in [0, 1]"))
                }
            }
            Param::ExcludeBorder => {
                if value == 0.0 || value == 1.0 {
                    Ok(())
                } else {
                    Err(invalid("must be 0 or 1"))
                }
            }
            _ => {
                if value >= 0.0 {
                    Ok(())
                } else {
                    Err(invalid("must be non-negative"))
                }
            }
        }
    }
}

/// Control metadata for one parameter entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterSpec {
    pub param: Param,
    pub min: f32,
    /// `None` when the upper bound depends on the data (the clipping ceiling).
    pub max: Option<f32>,
    pub step: f32,
}

/// The ten numeric segmentation parameters.
///
/// Values are validated on construction and on every edit, so a vector that
/// exists is always usable by the pipeline. Serialises as a flat JSON array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f32>", into = "Vec<f32>")]
pub struct ParameterVector {
    values: [f32; PARAM_COUNT],
}

impl ParameterVector {
    pub fn new(values: [f32; PARAM_COUNT]) -> Result<Self> {
        for param in Param::ALL {
            param.check(values[param.index()])?;
        }
        Ok(Self { values })
    }

    /// Build from a slice of 10 entries, or 9 legacy entries with the border
    /// flag defaulting to 0.
    pub fn from_slice(values: &[f32]) -> Result<Self> {
        let mut full = [0.0; PARAM_COUNT];
        match values.len() {
            PARAM_COUNT | LEGACY_PARAM_COUNT => {
                full[..values.len()].copy_from_slice(values);
                Self::new(full)
            }
            found => Err(SegmentError::InvalidParameterCount {
                expected: PARAM_COUNT,
                found,
            }),
        }
    }

    pub fn get(&self, param: Param) -> f32 {
        self.values[param.index()]
    }

    pub fn set(&mut self, param: Param, value: f32) -> Result<()> {
        param.check(value)?;
        self.values[param.index()] = value;
        Ok(())
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, param: Param, value: f32) -> Result<Self> {
        self.set(param, value)?;
        Ok(self)
    }

    pub fn as_array(&self) -> &[f32; PARAM_COUNT] {
        &self.values
    }

    /// Intensity ceiling, `None` when clipping is disabled.
    pub fn clip_limit(&self) -> Option<f32> {
        Some(self.get(Param::ClipLimit)).filter(|&v| v != 0.0)
    }

    pub fn bg_radius(&self) -> f32 {
        self.get(Param::BackgroundRadius)
    }

    pub fn smooth_radius(&self) -> f32 {
        self.get(Param::SmoothRadius)
    }

    pub fn threshold(&self) -> f32 {
        self.get(Param::Threshold)
    }

    /// Components smaller than this many pixels are removed.
    pub fn min_object_size(&self) -> usize {
        self.get(Param::MinObjectSize) as usize
    }

    pub fn center_weight(&self) -> f32 {
        self.get(Param::CenterWeight)
    }

    pub fn min_separation(&self) -> u32 {
        self.get(Param::MinSeparation) as u32
    }

    pub fn edge_blur_radius(&self) -> f32 {
        self.get(Param::EdgeBlurRadius)
    }

    pub fn watershed_ratio(&self) -> f32 {
        self.get(Param::WatershedRatio)
    }

    pub fn exclude_border(&self) -> bool {
        self.get(Param::ExcludeBorder) != 0.0
    }
}

impl Default for ParameterVector {
    fn default() -> Self {
        Self {
            values: [0.0, 0.0, 2.0, 0.25, 20.0, 0.5, 5.0, 2.0, 0.5, 0.0],
        }
    }
}

impl TryFrom<Vec<f32>> for ParameterVector {
    type Error = SegmentError;

    fn try_from(values: Vec<f32>) -> Result<Self> {
        Self::from_slice(&values)
    }
}

impl From<ParameterVector> for Vec<f32> {
    fn from(params: ParameterVector) -> Self {
        params.values.to_vec()
    }
}
