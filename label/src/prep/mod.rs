pub mod batch;
pub mod conform;
pub mod edt;
pub mod error;
pub mod extract;
pub mod improc;
pub mod iter;
pub mod log;
pub mod lut;
pub mod nii;
pub mod orient;
pub mod pos;
pub mod relabel;
pub mod volumetry;

pub use error::{PrepError, Result};
pub use improc::LabelVolume;
pub use iter::PosIter;
pub use log::AccTimer;
pub use pos::Pos;
