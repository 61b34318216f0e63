// crates/mh_blocks/tests/adjoint_tests.rs

//! 伴随检验：每个块与整条链都满足 <Mx, y> = <x, Mᵀy>

mod common;

use mh_blocks::{
    adjoint_test, random_fieldset, BlockRegistry, BlockVariant, OperatorChain, OuterBlock,
};
use mh_config::BlockConfig;
use mh_fieldset::{Communicator, Distribution, FieldSet, SerialComm};

const TOLERANCE: f64 = 1e-10;

fn build(config: &BlockConfig, xb: &FieldSet) -> BlockVariant {
    let fg = FieldSet::new();
    let ctx = common::model_context(xb, &fg).with_outer_variables(
        config
            .output_variables
            .clone()
            .unwrap_or_else(common::model_vars),
    );
    BlockRegistry::with_builtin_blocks().create(&ctx, config).unwrap()
}

fn every_block() -> Vec<BlockVariant> {
    let xb = common::background(&common::model_space(), 2);
    vec![
        build(&common::interpolation_config(common::temperature_vars()), &xb),
        build(&common::air_temperature_config(), &xb),
        build(&common::std_dev_config(1.7), &xb),
    ]
}

fn random_pair(block: &dyn OuterBlock, seed: u64) -> (FieldSet, FieldSet) {
    let inner = random_fieldset(
        block.inner_variables(),
        block.inner_function_space().size(),
        seed,
    )
    .unwrap();
    let outer = random_fieldset(
        block.outer_variables(),
        block.outer_function_space().size(),
        seed + 1000,
    )
    .unwrap();
    (inner, outer)
}

#[test]
fn test_every_block_is_adjoint() {
    let comm = SerialComm::new();
    for block in every_block() {
        for seed in 1..4 {
            let (inner, outer) = random_pair(&block, seed);
            let report =
                adjoint_test(&block, &inner, &outer, &comm, Distribution::Partitioned).unwrap();
            assert!(
                report.passed(TOLERANCE),
                "{}: lhs={} rhs={} err={}",
                block.name(),
                report.lhs,
                report.rhs,
                report.relative_error
            );
        }
    }
}

#[test]
fn test_round_trip_preserves_shape() {
    for block in every_block() {
        let (inner, _) = random_pair(&block, 11);
        let mut fields = inner.clone();
        block.multiply(&mut fields).unwrap();
        assert_eq!(fields.variables(), *block.outer_variables());
        for f in &fields {
            assert_eq!(f.n_points(), block.outer_function_space().size());
        }

        block.multiply_ad(&mut fields).unwrap();
        assert_eq!(fields.variables(), *block.inner_variables());
        for f in &fields {
            assert_eq!(f.shape(), inner.get(f.name()).unwrap().shape());
        }
    }
}

#[test]
fn test_calibration_noop_is_bit_identical() {
    let xb = common::background(&common::model_space(), 2);
    for config in [
        common::interpolation_config(common::temperature_vars()),
        common::air_temperature_config(),
    ] {
        let block = build(&config, &xb);
        let (_, outer) = random_pair(&block, 5);
        let mut fields = outer.clone();
        block.calibration_inverse_multiply(&mut fields).unwrap();
        assert_eq!(fields, outer);
        for (a, b) in fields.iter().zip(outer.iter()) {
            assert!(a
                .data()
                .iter()
                .zip(b.data())
                .all(|(x, y)| x.to_bits() == y.to_bits()));
        }
    }
}

#[test]
fn test_full_chain_is_adjoint() {
    let xb = common::background(&common::model_space(), 2);
    let fg = FieldSet::new();
    let ctx = common::model_context(&xb, &fg).with_outer_variables(common::model_vars());
    let chain = OperatorChain::build(
        &BlockRegistry::with_builtin_blocks(),
        &ctx,
        &common::full_chain_config(),
    )
    .unwrap();

    let inner = random_fieldset(chain.inner_variables(), chain.inner_function_space().size(), 3)
        .unwrap();
    let outer = random_fieldset(chain.outer_variables(), chain.outer_function_space().size(), 4)
        .unwrap();
    let report = chain.adjoint_test(&inner, &outer).unwrap();
    assert!(report.passed(TOLERANCE), "{:?}", report);
}

/// 两个进程持有相同分块的模拟通信器：归约结果为本地值的两倍
#[derive(Debug)]
struct MirroredComm;

impl Communicator for MirroredComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        2
    }

    fn all_reduce_sum(&self, values: &mut [f64]) {
        for v in values {
            *v *= 2.0;
        }
    }

    fn all_reduce_max(&self, _values: &mut [f64]) {}
}

#[test]
fn test_interpolation_adjoint_with_partitioned_model_grid() {
    let xb = FieldSet::new();
    let fg = FieldSet::new();
    let mut ctx = common::model_context(&xb, &fg);
    ctx.comm = std::sync::Arc::new(MirroredComm);
    let block = BlockRegistry::with_builtin_blocks()
        .create(&ctx, &common::interpolation_config(common::temperature_vars()))
        .unwrap();

    let (inner, outer) = random_pair(&block, 21);
    let report =
        adjoint_test(&block, &inner, &outer, &MirroredComm, Distribution::Partitioned).unwrap();
    assert!(report.passed(TOLERANCE), "{:?}", report);

    // 内部网格是复制的：按分块处理会重复计数
    let mut backward = outer.clone();
    block.multiply_ad(&mut backward).unwrap();
    let wrong = inner
        .dot(&backward, &MirroredComm, Distribution::Partitioned)
        .unwrap();
    assert!((wrong - 2.0 * report.rhs).abs() < 1e-9 * report.rhs.abs().max(1.0));
}
