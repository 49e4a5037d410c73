//! 三维分割标签体数据工具：NIfTI读写、标签重映射、脑掩膜形态学、体积统计与强度规范化。

pub mod prelude;
pub mod prep;
