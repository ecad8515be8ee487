pub mod bar;
pub mod bias;
pub mod contract;
pub mod position;
