//! Controller layer: UI events, form drafts, and command orchestration.

pub mod events;
pub mod forms;
pub mod orchestration;
