// crates/mh_blocks/tests/registry_tests.rs

//! 注册中心：唯一性、未知块、未知变量

mod common;

use mh_blocks::registry::builtin_factories;
use mh_blocks::{BlockError, BlockRegistry, BlockVariant, OuterBlock};
use mh_config::BlockConfig;
use mh_fieldset::{Field, FieldSet};

/// 任意注册顺序下，重复注册都被拒绝
#[test]
fn test_duplicate_rejected_in_any_order() {
    let orders: [[usize; 3]; 6] = [
        [0, 1, 2],
        [0, 2, 1],
        [1, 0, 2],
        [1, 2, 0],
        [2, 0, 1],
        [2, 1, 0],
    ];
    let factories = builtin_factories();
    for order in orders {
        let mut registry = BlockRegistry::new();
        for &i in &order {
            let (name, factory) = factories[i];
            registry.register(name, factory).unwrap();
        }
        for &i in order.iter().rev() {
            let (name, factory) = factories[i];
            match registry.register(name, factory) {
                Err(BlockError::DuplicateRegistration { name: dup }) => assert_eq!(dup, name),
                other => panic!("'{}' 重复注册应失败: {:?}", name, other.map(|_| ())),
            }
        }
        assert_eq!(registry.len(), 3);
        let expected: Vec<&str> = order.iter().map(|&i| factories[i].0).collect();
        assert_eq!(registry.names(), expected);
    }
}

#[test]
fn test_unknown_block_type() {
    let registry = BlockRegistry::with_builtin_blocks();
    let xb = FieldSet::new();
    let fg = FieldSet::new();
    let ctx = common::model_context(&xb, &fg);

    let err = registry
        .create(&ctx, &BlockConfig::new("spectral transform"))
        .unwrap_err();
    assert!(matches!(err, BlockError::UnknownBlockType { ref name } if name == "spectral transform"));
    assert!(matches!(
        registry.create_parameters("spectral transform"),
        Err(BlockError::UnknownBlockType { .. })
    ));
}

#[test]
fn test_parameter_schemas() {
    let registry = BlockRegistry::with_builtin_blocks();
    for name in registry.names() {
        let schema = registry.create_parameters(name).unwrap();
        assert_eq!(schema.block(), name);
        assert!(!schema.keys().is_empty());
    }

    let schema = registry
        .create_parameters(mh_blocks::std_dev::BLOCK_NAME)
        .unwrap();
    let typo = common::std_dev_config(1.0).with_param("defualt value", serde_json::json!(1.0));
    assert!(matches!(schema.validate(&typo), Err(BlockError::Config(_))));
}

fn every_block(xb: &FieldSet) -> Vec<BlockVariant> {
    let registry = BlockRegistry::with_builtin_blocks();
    let fg = FieldSet::new();
    let ctx = common::model_context(xb, &fg);
    vec![
        registry
            .create(&ctx, &common::interpolation_config(common::temperature_vars()))
            .unwrap(),
        registry.create(&ctx, &common::air_temperature_config()).unwrap(),
        registry
            .create(
                &ctx.clone().with_outer_variables(common::model_vars()),
                &common::std_dev_config(1.0),
            )
            .unwrap(),
    ]
}

/// 每种块在两个方向上都拒绝未声明的变量，且集合保持不变
#[test]
fn test_unknown_variable_rejected_by_every_block() {
    let xb = common::background(&common::model_space(), 2);
    for block in every_block(&xb) {
        let n_inner = block.inner_function_space().size();
        let mut inner = FieldSet::zeros_like(block.inner_variables(), n_inner);
        inner.add(Field::zeros("salinity", 1, n_inner)).unwrap();
        let before = inner.clone();
        match block.multiply(&mut inner) {
            Err(BlockError::UnknownVariable { block: b, variable }) => {
                assert_eq!(b, block.name());
                assert_eq!(variable, "salinity");
            }
            other => panic!("{} multiply: {:?}", block.name(), other),
        }
        assert_eq!(inner, before);

        let n_outer = block.outer_function_space().size();
        let mut outer = FieldSet::zeros_like(block.outer_variables(), n_outer);
        outer.add(Field::zeros("salinity", 1, n_outer)).unwrap();
        let before = outer.clone();
        match block.multiply_ad(&mut outer) {
            Err(BlockError::UnknownVariable { block: b, variable }) => {
                assert_eq!(b, block.name());
                assert_eq!(variable, "salinity");
            }
            other => panic!("{} multiply_ad: {:?}", block.name(), other),
        }
        assert_eq!(outer, before);
    }
}

/// 同一工厂注册在别名下：按别名构造，块名与错误信息使用别名
#[test]
fn test_create_through_registered_alias() {
    let mut registry = BlockRegistry::with_builtin_blocks();
    let (_, factory) = builtin_factories()[2];
    registry.register("scaled copy", factory).unwrap();
    assert!(registry.has("scaled copy"));
    assert_eq!(
        registry.create_parameters("scaled copy").unwrap().block(),
        mh_blocks::std_dev::BLOCK_NAME
    );

    let xb = FieldSet::new();
    let fg = FieldSet::new();
    let ctx = common::model_context(&xb, &fg).with_outer_variables(common::model_vars());
    let config = BlockConfig::new("scaled copy").with_param("default value", serde_json::json!(3.0));
    let block = registry.create(&ctx, &config).unwrap();
    assert_eq!(block.name(), "scaled copy");
    assert!(block.to_string().starts_with("scaled copy:"));

    let mut fields = FieldSet::zeros_like(block.inner_variables(), 400);
    fields.add(Field::zeros("salinity", 1, 400)).unwrap();
    match block.multiply(&mut fields) {
        Err(BlockError::UnknownVariable { block: b, .. }) => assert_eq!(b, "scaled copy"),
        other => panic!("unexpected: {:?}", other),
    }

    let bad = BlockConfig::new("scaled copy").with_param("default value", serde_json::json!(-1.0));
    match registry.create(&ctx, &bad) {
        Err(BlockError::InvalidParameter { block, .. }) => assert_eq!(block, "scaled copy"),
        other => panic!("unexpected: {:?}", other.map(|b| b.to_string())),
    }
}
