pub mod icons;
pub mod pipeline_ui;

pub use pipeline_ui::{PipelineUI, UiMode};
