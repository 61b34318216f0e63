// crates/mh_blocks/src/registry.rs

//! 算子块注册中心
//!
//! 块名 → 工厂的唯一映射。工厂同时提供块实例的构造函数和
//! 与之对应的参数模式，用于在构造前检查配置。
//!
//! # 两阶段生命周期
//!
//! 进程级注册中心（[`global`]）先处于注册阶段，可以追加自定义块；
//! 第一次 `create`（或显式 `seal`）之后进入只读阶段，再注册会返回
//! [`BlockError::RegistrySealed`]。只读阶段的并发构造只获取共享读锁。
//!
//! # 示例
//!
//! ```ignore
//! let registry = BlockRegistry::with_builtin_blocks();
//! let block = registry.create(&ctx, &config)?;
//! ```

use std::collections::HashMap;
use std::fmt;

use mh_config::BlockConfig;

use crate::block::{BlockContext, BlockVariant};
use crate::error::{BlockError, BlockResult};
use crate::interpolation::{self, GridInterpolationBlock};
use crate::std_dev::{self, StdDevBlock};
use crate::vader::{self, AirTemperatureBlock};

/// 块构造函数
pub type MakeFn = fn(&BlockContext<'_>, &BlockConfig) -> BlockResult<BlockVariant>;

/// 块参数检查函数
pub type ValidateFn = fn(&BlockConfig) -> BlockResult<()>;

/// 块参数模式
#[derive(Clone, Copy)]
pub struct ParameterSchema {
    block: &'static str,
    keys: &'static [&'static str],
    check: ValidateFn,
}

impl ParameterSchema {
    /// 创建参数模式
    pub fn new(block: &'static str, keys: &'static [&'static str], check: ValidateFn) -> Self {
        Self { block, keys, check }
    }

    /// 块的内置名
    pub fn block(&self) -> &'static str {
        self.block
    }

    /// 块专属参数键
    pub fn keys(&self) -> &'static [&'static str] {
        self.keys
    }

    /// 检查配置：通用字段与块专属参数
    ///
    /// 块名由注册中心负责路由，这里不做比较：同一工厂可以注册在多个名字下。
    pub fn validate(&self, config: &BlockConfig) -> BlockResult<()> {
        config.validate()?;
        (self.check)(config)
    }
}

impl fmt::Debug for ParameterSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterSchema")
            .field("block", &self.block)
            .field("keys", &self.keys)
            .finish()
    }
}

/// 块工厂
#[derive(Clone, Copy)]
pub struct BlockFactory {
    /// 构造块实例
    pub make: MakeFn,
    /// 构造参数模式
    pub make_parameters: fn() -> ParameterSchema,
}

impl BlockFactory {
    /// 创建工厂
    pub fn new(make: MakeFn, make_parameters: fn() -> ParameterSchema) -> Self {
        Self {
            make,
            make_parameters,
        }
    }
}

impl fmt::Debug for BlockFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockFactory")
            .field("block", &(self.make_parameters)().block())
            .finish()
    }
}

/// 算子块注册中心
#[derive(Debug, Default)]
pub struct BlockRegistry {
    factories: HashMap<String, BlockFactory>,
    /// 注册顺序
    order: Vec<String>,
}

impl BlockRegistry {
    /// 创建空注册中心
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建已注册全部内置块的注册中心
    pub fn with_builtin_blocks() -> Self {
        let mut registry = Self::new();
        for (name, factory) in builtin_factories() {
            let registered = registry.register(name, factory);
            debug_assert!(registered.is_ok(), "内置块重名: {}", name);
        }
        registry
    }

    /// 注册块工厂
    pub fn register(&mut self, name: impl Into<String>, factory: BlockFactory) -> BlockResult<()> {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(BlockError::DuplicateRegistration { name });
        }
        log::debug!("注册算子块 '{}'", name);
        self.order.push(name.clone());
        self.factories.insert(name, factory);
        Ok(())
    }

    fn factory(&self, name: &str) -> BlockResult<&BlockFactory> {
        self.factories
            .get(name)
            .ok_or_else(|| BlockError::UnknownBlockType {
                name: name.to_string(),
            })
    }

    /// 按配置中的块名构造块
    ///
    /// 只有块名未注册时失败；构造前先用参数模式检查配置，
    /// 构造出的块以配置中的块名作为 `name()`。
    pub fn create(&self, ctx: &BlockContext<'_>, config: &BlockConfig) -> BlockResult<BlockVariant> {
        let factory = self.factory(&config.name)?;
        (factory.make_parameters)().validate(config)?;
        (factory.make)(ctx, config)
    }

    /// 获取块的参数模式
    pub fn create_parameters(&self, name: &str) -> BlockResult<ParameterSchema> {
        Ok((self.factory(name)?.make_parameters)())
    }

    /// 是否已注册
    pub fn has(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// 已注册块名（按注册顺序）
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(|s| s.as_str()).collect()
    }

    /// 已注册数量
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

/// 内置块工厂
pub fn builtin_factories() -> [(&'static str, BlockFactory); 3] {
    [
        (
            interpolation::BLOCK_NAME,
            BlockFactory::new(
                |ctx, config| GridInterpolationBlock::new(ctx, config).map(Into::into),
                interpolation::parameters,
            ),
        ),
        (
            vader::BLOCK_NAME,
            BlockFactory::new(
                |ctx, config| AirTemperatureBlock::new(ctx, config).map(Into::into),
                vader::parameters,
            ),
        ),
        (
            std_dev::BLOCK_NAME,
            BlockFactory::new(
                |ctx, config| StdDevBlock::new(ctx, config).map(Into::into),
                std_dev::parameters,
            ),
        ),
    ]
}

/// 进程级注册中心
pub mod global {
    use std::sync::atomic::{AtomicBool, Ordering};

    use once_cell::sync::Lazy;
    use parking_lot::RwLock;

    use super::*;

    static REGISTRY: Lazy<RwLock<BlockRegistry>> =
        Lazy::new(|| RwLock::new(BlockRegistry::with_builtin_blocks()));

    static SEALED: AtomicBool = AtomicBool::new(false);

    /// 注册自定义块（仅限注册阶段）
    pub fn register(name: impl Into<String>, factory: BlockFactory) -> BlockResult<()> {
        let name = name.into();
        let mut registry = REGISTRY.write();
        if SEALED.load(Ordering::Acquire) {
            return Err(BlockError::RegistrySealed { name });
        }
        registry.register(name, factory)
    }

    /// 结束注册阶段
    pub fn seal() {
        if !SEALED.load(Ordering::Acquire) {
            // 持写锁置位，与进行中的注册互斥
            let _guard = REGISTRY.write();
            if !SEALED.swap(true, Ordering::AcqRel) {
                log::debug!("算子块注册中心已封闭");
            }
        }
    }

    /// 是否已封闭
    pub fn is_sealed() -> bool {
        SEALED.load(Ordering::Acquire)
    }

    /// 构造块（封闭注册中心）
    pub fn create(ctx: &BlockContext<'_>, config: &BlockConfig) -> BlockResult<BlockVariant> {
        with_registry(|registry| registry.create(ctx, config))
    }

    /// 获取块的参数模式
    pub fn create_parameters(name: &str) -> BlockResult<ParameterSchema> {
        REGISTRY.read().create_parameters(name)
    }

    /// 在只读阶段访问注册中心（封闭注册中心）
    pub fn with_registry<R>(f: impl FnOnce(&BlockRegistry) -> R) -> R {
        seal();
        f(&REGISTRY.read())
    }
}
