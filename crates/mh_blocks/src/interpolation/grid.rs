// crates/mh_blocks/src/interpolation/grid.rs

//! 内部（分析）网格参数

use serde::{Deserialize, Serialize};

use mh_fieldset::{BoundingBox, Communicator, FieldResult, FunctionSpace};

/// 内部网格函数空间名称
pub const INTERNAL_GRID_NAME: &str = "gsi";

/// 内部规则网格参数
///
/// # JSON 示例
///
/// ```json
/// {"nx": 10, "ny": 10, "bounds": {"min_x": 0.0, "min_y": 0.0, "max_x": 1.0, "max_y": 1.0}}
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InternalGridParameters {
    /// x 方向点数
    pub nx: usize,
    /// y 方向点数
    pub ny: usize,
    /// 覆盖范围，缺省取模式网格所有分块合并后的包围盒
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<BoundingBox>,
}

impl InternalGridParameters {
    /// 创建参数（范围取模式网格全局包围盒）
    pub fn new(nx: usize, ny: usize) -> Self {
        Self {
            nx,
            ny,
            bounds: None,
        }
    }

    /// 指定覆盖范围
    pub fn with_bounds(mut self, bounds: BoundingBox) -> Self {
        self.bounds = Some(bounds);
        self
    }

    /// 总点数
    pub fn size(&self) -> usize {
        self.nx * self.ny
    }

    /// 在模式网格范围上构造内部网格
    ///
    /// 内部网格在每个进程上完整复制，缺省范围必须在所有进程上一致，
    /// 因此未给出 `bounds` 时这是一次集合操作。
    pub fn build(
        &self,
        native: &FunctionSpace,
        comm: &dyn Communicator,
    ) -> FieldResult<FunctionSpace> {
        let bounds = match self.bounds {
            Some(bounds) => bounds,
            None => native.global_bounds(comm),
        };
        FunctionSpace::regular_grid(INTERNAL_GRID_NAME, self.nx, self.ny, bounds)
    }
}
