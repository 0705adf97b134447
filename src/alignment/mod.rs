pub mod decoder;
pub mod textgrid;
