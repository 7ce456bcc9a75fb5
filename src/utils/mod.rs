pub mod dct_ops;
pub mod fs_ops;
pub mod image_ops;
