pub mod amap;
pub mod null;
