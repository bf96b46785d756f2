//! Built-in stages of the fixed chain.
//!
//! | Stage | Control input | Kernel |
//! |-------|---------------|--------|
//! | [`EqStage`] | [`EqControls`] (three atomic band gains) | low shelf / peaking / high shelf |
//! | [`FilterStage`] | [`FilterCell`](crate::FilterCell) | low-pass / high-pass biquad |
//! | [`SidechainGainStage`] | [`GainCell`](crate::GainCell) | smoothed gain |
//! | [`LimiterStage`] | [`LimiterPolicy`](crate::LimiterPolicy) (fixed) | dynamics kernel |

mod eq;
mod filter;
mod gain;
mod limiter;

pub use eq::{ControlMap, EQ_MAX_DB, EQ_MIN_DB, EqBand, EqControls, EqStage};
pub use filter::FilterStage;
pub use gain::SidechainGainStage;
pub use limiter::LimiterStage;
