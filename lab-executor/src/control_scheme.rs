use log::warn;
use pressure_model::{ArraySpec, ConstantRate, Linear, Steps};
use std::cmp::min;

/// Slider position for the `nth` control tick. Implementations only return positions their
/// schedule was validated for.
pub trait ControlScheme {
    fn next(&mut self, nth: u32) -> u32;
}

impl ControlScheme for ConstantRate {
    #[inline]
    fn next(&mut self, _nth: u32) -> u32 {
        self.position
    }
}

impl ControlScheme for ArraySpec {
    #[inline]
    fn next(&mut self, nth: u32) -> u32 {
        let len = self.positions.len();
        if len != 0 {
            self.positions[nth as usize % len]
        } else {
            warn!("Empty position list");
            pressure_model::MIN_CONTROL
        }
    }
}

impl ControlScheme for Linear {
    fn next(&mut self, nth: u32) -> u32 {
        min(
            ((self.a * nth as f32).ceil() as u32).saturating_add(self.b),
            self.max,
        )
    }
}

impl ControlScheme for Steps {
    fn next(&mut self, nth: u32) -> u32 {
        let x = if let Some(step) = self.steps.get(self.current_step) {
            if step.start <= nth && step.end >= nth {
                (step.position, false)
            } else {
                //not found in current_step, check next
                self.steps.get(self.current_step + 1).map_or_else(
                    || {
                        (
                            //not found in current_step+1, use last step as fallback
                            self.steps
                                .last()
                                .map_or(pressure_model::MIN_CONTROL, |s| s.position),
                            false,
                        )
                    },
                    |s| (s.position, true),
                )
            }
        } else {
            warn!("Invalid current step");
            (pressure_model::MIN_CONTROL, false)
        };
        if x.1 {
            self.current_step += 1;
        }
        x.0
    }
}
