use crate::scale::{MAX_CONTROL, MIN_CONTROL};
use log::debug;
use serde::{Deserialize, Serialize};

fn check_position(position: u32, name: &str) -> anyhow::Result<u32> {
    if (MIN_CONTROL..=MAX_CONTROL).contains(&position) {
        Ok(position)
    } else {
        debug!("rejecting {}: {}", name, position);
        Err(anyhow::anyhow!(
            "{}({}) should be between {} and {}",
            name,
            position,
            MIN_CONTROL,
            MAX_CONTROL
        ))
    }
}

/// Keep the slider at one position for the whole session
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
#[serde(try_from = "ConstantRateShadowType")]
pub struct ConstantRate {
    pub position: u32,
}

#[derive(Deserialize)]
pub struct ConstantRateShadowType {
    position: u32,
}

impl TryFrom<ConstantRateShadowType> for ConstantRate {
    type Error = anyhow::Error;

    fn try_from(value: ConstantRateShadowType) -> Result<Self, Self::Error> {
        Ok(ConstantRate {
            position: check_position(value.position, "position")?,
        })
    }
}

/// Cycle through the listed positions, one per control tick
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
#[serde(try_from = "ArraySpecShadowType")]
pub struct ArraySpec {
    pub positions: Vec<u32>,
}

impl ArraySpec {
    pub fn new(positions: Vec<u32>) -> anyhow::Result<Self> {
        ArraySpecShadowType { positions }.try_into()
    }
}

#[derive(Deserialize)]
pub struct ArraySpecShadowType {
    positions: Vec<u32>,
}

impl TryFrom<ArraySpecShadowType> for ArraySpec {
    type Error = anyhow::Error;

    fn try_from(value: ArraySpecShadowType) -> Result<Self, Self::Error> {
        if value.positions.is_empty() {
            return Err(anyhow::anyhow!("No positions found."));
        }
        for position in value.positions.iter() {
            check_position(*position, "position")?;
        }
        Ok(ArraySpec {
            positions: value.positions,
        })
    }
}

/// Move the slider linearly as per equation
/// `y=ceil(ax+b)` until hit the max cap
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(try_from = "LinearShadowType")]
pub struct Linear {
    pub a: f32,
    pub b: u32,
    pub max: u32,
}

#[derive(Deserialize)]
pub struct LinearShadowType {
    a: f32,
    b: u32,
    max: u32,
}

impl TryFrom<LinearShadowType> for Linear {
    type Error = anyhow::Error;

    fn try_from(value: LinearShadowType) -> Result<Self, Self::Error> {
        if !value.a.is_finite() || value.a < 0f32 {
            return Err(anyhow::anyhow!(
                "a({}) should be a non-negative number",
                value.a
            ));
        }
        let b = check_position(value.b, "b")?;
        let max = check_position(value.max, "max")?;
        if b > max {
            return Err(anyhow::anyhow!(
                "b({}) can not be greater than max({})",
                b,
                max
            ));
        }
        Ok(Linear { a: value.a, b, max })
    }
}

/// Hold `position` from control tick `start` through `end`, both inclusive
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(try_from = "StepShadowType")]
pub struct Step {
    pub start: u32,
    pub end: u32,
    pub position: u32,
}

#[derive(Deserialize)]
pub struct StepShadowType {
    start: u32,
    end: u32,
    position: u32,
}

impl TryFrom<StepShadowType> for Step {
    type Error = anyhow::Error;

    fn try_from(value: StepShadowType) -> Result<Self, Self::Error> {
        if value.end <= value.start {
            return Err(anyhow::anyhow!(
                "step end({}) should be after start({})",
                value.end,
                value.start
            ));
        }
        Ok(Step {
            start: value.start,
            end: value.end,
            position: check_position(value.position, "position")?,
        })
    }
}

/// Piecewise constant slider. Steps cover the ticks from 0 without gaps, the last position
/// holds after the final step.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(try_from = "StepsShadowType")]
pub struct Steps {
    #[serde(skip)]
    pub current_step: usize,
    pub steps: Vec<Step>,
}

#[derive(Deserialize)]
pub struct StepsShadowType {
    steps: Vec<Step>,
}

impl TryFrom<StepsShadowType> for Steps {
    type Error = anyhow::Error;

    fn try_from(value: StepsShadowType) -> Result<Self, Self::Error> {
        let mut steps = value.steps;
        match steps.len() {
            0 => return Err(anyhow::anyhow!("steps can not be empty")),
            1 => {
                return Err(anyhow::anyhow!(
                    "a single step holds one position, use ConstantRate instead"
                ))
            }
            _ => {}
        }
        steps.sort_unstable_by_key(|step| step.start);
        if steps[0].start != 0 {
            return Err(anyhow::anyhow!(
                "first step should start at tick 0, found {}",
                steps[0].start
            ));
        }
        if let Some(pair) = steps
            .windows(2)
            .find(|pair| pair[0].end.checked_add(1) != Some(pair[1].start))
        {
            return Err(anyhow::anyhow!(
                "gap or overlap between ticks {} and {}",
                pair[0].end,
                pair[1].start
            ));
        }
        Ok(Steps {
            current_step: 0,
            steps,
        })
    }
}

/// How the slider of a lab session moves over time
#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum ControlSpecEnum {
    ConstantRate(ConstantRate),
    Linear(Linear),
    ArraySpec(ArraySpec),
    Steps(Steps),
}
