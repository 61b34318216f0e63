// crates/mh_blocks/src/vader/mod.rs

//! 变量变换块
//!
//! 在同一函数空间上改变变量（如位温 → 气温），不改变水平离散。
//! 非线性关系在背景态处线性化，所需轨迹在构造时从背景场冻结。

pub mod air_temperature;

pub use air_temperature::{
    parameters, AirTemperatureBlock, AirTemperatureParameters, BLOCK_NAME,
};
