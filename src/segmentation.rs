mod artefacts;
mod merge;
mod region;
mod threshold;
mod watershed;

pub use artefacts::correct_artefacts;
pub use merge::{MergeConfig, merge_oversegmentation, merge_regions};
pub use region::{BoundingBox, CandidateRegion, dilate};
pub use threshold::{isodata_threshold, threshold};
pub use watershed::{SegmentConfig, distance_transform_edt, peak_local_max, segment, watershed};
