pub use super::prep::batch::{run_batch, worker_count};
pub use super::prep::error::{PrepError, Result};
pub use super::prep::improc::consts::{
    CLOSING_RADIUS, CSF_LABEL, LEFT_CORTEX, MASK_THRESHOLD, RIGHT_CORTEX,
};
pub use super::prep::improc::LabelVolume;
pub use super::prep::iter::PosIter;
pub use super::prep::log::AccTimer;
pub use super::prep::lut::LabelLut;
pub use super::prep::nii::{list_nii_files, NiiVolume};
pub use super::prep::pos::Pos;
pub use super::prep::relabel::{RelabelOptions, SetToOne};
