// crates/mh_blocks/tests/common/mod.rs

//! 集成测试共用的几何、配置与背景场

#![allow(dead_code)]

use std::sync::Arc;

use mh_blocks::interpolation;
use mh_blocks::{std_dev, vader, BlockContext};
use mh_config::{BlockConfig, ChainConfig};
use mh_fieldset::{
    BoundingBox, Communicator, Field, FieldSet, FunctionSpace, SerialComm, VariableSet,
};
use serde_json::json;

pub fn comm() -> Arc<dyn Communicator> {
    Arc::new(SerialComm::new())
}

/// 20×20 模式网格
pub fn model_space() -> FunctionSpace {
    FunctionSpace::regular_grid("model", 20, 20, BoundingBox::new(0.0, 0.0, 1.0, 1.0)).unwrap()
}

pub fn temperature_vars() -> VariableSet {
    VariableSet::from_pairs([("temperature", 2)]).unwrap()
}

/// 模式网格上的外侧变量
pub fn model_vars() -> VariableSet {
    VariableSet::from_pairs([("air_temperature", 2), ("surface_pressure", 1)]).unwrap()
}

/// 气温块的内侧变量
pub fn analysis_vars() -> VariableSet {
    VariableSet::from_pairs([("potential_temperature", 2), ("surface_pressure", 1)]).unwrap()
}

/// 10×10 内部网格插值块配置
pub fn interpolation_config(vars: VariableSet) -> BlockConfig {
    BlockConfig::new(interpolation::BLOCK_NAME)
        .with_variables(vars)
        .with_param("grid", json!({"nx": 10, "ny": 10}))
}

pub fn air_temperature_config() -> BlockConfig {
    BlockConfig::new(vader::BLOCK_NAME).with_output_variables(model_vars())
}

pub fn std_dev_config(value: f64) -> BlockConfig {
    BlockConfig::new(std_dev::BLOCK_NAME).with_param("default value", json!(value))
}

/// 背景场：随位置平滑变化的 Exner 函数
pub fn background(space: &FunctionSpace, levels: usize) -> FieldSet {
    let n = space.size();
    let mut data = Vec::with_capacity(levels * n);
    for level in 0..levels {
        for p in space.points() {
            data.push(0.8 + 0.1 * p.x + 0.05 * p.y - 0.02 * level as f64);
        }
    }
    let mut xb = FieldSet::new();
    xb.add(Field::from_data("exner", levels, n, data).unwrap()).unwrap();
    xb
}

/// 应用顺序：标准差 → 插值 → 气温
pub fn full_chain_config() -> ChainConfig {
    ChainConfig::new(vec![
        std_dev_config(2.0),
        interpolation_config(analysis_vars()),
        air_temperature_config(),
    ])
}

pub fn model_context<'a>(xb: &'a FieldSet, fg: &'a FieldSet) -> BlockContext<'a> {
    BlockContext::new(comm(), model_space(), xb, fg)
}
