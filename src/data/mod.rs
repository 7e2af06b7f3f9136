pub mod batchitem;
pub mod variables;

pub use batchitem::{BatchItem, RolloutBatch};
pub use variables::{SampleDims, VariableGroups};
