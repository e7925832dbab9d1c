mod correspondence;
mod cost;
mod matching;

pub use correspondence::{
    CorrespondenceConfig, CorrespondenceTable, SingleCellPolicy, correspond, correspond_with,
    match_labels,
};
pub use cost::{CellStats, CostFunction, OverlapTable};
pub use matching::{AssignmentResult, linear_assignment};
