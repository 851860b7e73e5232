//! Built-in plan elements: controllers, the HTTP sampler, and the two
//! thread-group schedulers.

mod controllers;
mod extract;
mod http_sampler;
mod thread_groups;


pub use controllers::{IfCondition, IfController, LoopController, PauseController};
pub use extract::extract_json_path;
pub use http_sampler::HttpSampler;
pub use thread_groups::{RpsThreadGroup, SimpleThreadGroup};

use crate::plan::ElementFactory;

/// Factories for every built-in element type, consumed once by the plan
/// registry at first lookup.
#[must_use]
pub fn builtin_factories() -> Vec<(&'static str, ElementFactory)> {
    vec![
        ("TestPlan", crate::plan::PlanRoot::factory),
        ("SimpleThreadGroup", SimpleThreadGroup::factory),
        ("RPSThreadGroup", RpsThreadGroup::factory),
        ("HttpSampler", HttpSampler::factory),
        ("LoopController", LoopController::factory),
        ("IfController", IfController::factory),
        ("PauseController", PauseController::factory),
    ]
}
