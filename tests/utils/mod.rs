pub mod image;
pub mod testfs;
