// crates/mh_fieldset/src/function_space.rs

//! 函数空间（空间离散化）
//!
//! 函数空间描述场定义在哪些水平点上。这里统一使用点云表示：
//! 结构网格也只是按行优先 (j * nx + i) 排列的点云，
//! 额外记录 `nx`/`ny` 供诊断输出使用。
//!
//! `FunctionSpace` 内部使用 `Arc` 共享，克隆开销为常数，
//! 因此可以在链中的多个算子块之间自由传递。

use std::fmt;
use std::sync::Arc;

use crate::comm::Communicator;
use crate::error::{FieldError, FieldResult};
use crate::field::Field;
use crate::geometry::{BoundingBox, Point2D};

/// 函数空间种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpaceKind {
    /// 非结构点云
    PointCloud,
    /// 规则经纬/投影网格
    RegularGrid {
        /// x 方向点数
        nx: usize,
        /// y 方向点数
        ny: usize,
    },
}

#[derive(Debug)]
struct SpaceInner {
    name: String,
    kind: SpaceKind,
    points: Vec<Point2D>,
}

/// 函数空间
#[derive(Debug, Clone)]
pub struct FunctionSpace {
    inner: Arc<SpaceInner>,
}

impl FunctionSpace {
    /// 从点集创建点云函数空间
    pub fn point_cloud(name: impl Into<String>, points: Vec<Point2D>) -> FieldResult<Self> {
        let name = name.into();
        if points.is_empty() {
            return Err(FieldError::invalid_space(name, "点集为空"));
        }
        if points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return Err(FieldError::invalid_space(name, "点坐标包含非有限值"));
        }
        Ok(Self {
            inner: Arc::new(SpaceInner {
                name,
                kind: SpaceKind::PointCloud,
                points,
            }),
        })
    }

    /// 创建规则网格函数空间
    ///
    /// 点按行优先排列：索引 `j * nx + i` 对应
    /// `(min_x + i * dx, min_y + j * dy)`。单点方向取边界框下界。
    pub fn regular_grid(
        name: impl Into<String>,
        nx: usize,
        ny: usize,
        bounds: BoundingBox,
    ) -> FieldResult<Self> {
        let name = name.into();
        if nx == 0 || ny == 0 {
            return Err(FieldError::invalid_space(
                name,
                format!("网格尺寸必须为正: nx={}, ny={}", nx, ny),
            ));
        }
        let dx = if nx > 1 {
            bounds.width() / (nx - 1) as f64
        } else {
            0.0
        };
        let dy = if ny > 1 {
            bounds.height() / (ny - 1) as f64
        } else {
            0.0
        };

        let mut points = Vec::with_capacity(nx * ny);
        for j in 0..ny {
            for i in 0..nx {
                points.push(Point2D::new(
                    bounds.min_x + i as f64 * dx,
                    bounds.min_y + j as f64 * dy,
                ));
            }
        }

        Ok(Self {
            inner: Arc::new(SpaceInner {
                name,
                kind: SpaceKind::RegularGrid { nx, ny },
                points,
            }),
        })
    }

    /// 函数空间名称
    #[inline]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// 种类
    #[inline]
    pub fn kind(&self) -> SpaceKind {
        self.inner.kind
    }

    /// 本地水平点数
    #[inline]
    pub fn size(&self) -> usize {
        self.inner.points.len()
    }

    /// 点坐标
    #[inline]
    pub fn points(&self) -> &[Point2D] {
        &self.inner.points
    }

    /// 包围盒
    pub fn bounds(&self) -> BoundingBox {
        // 构造时保证点集非空
        BoundingBox::from_points(&self.inner.points)
            .unwrap_or_else(|| BoundingBox::new(0.0, 0.0, 0.0, 0.0))
    }

    /// 所有进程分块合并后的包围盒（集合操作）
    pub fn global_bounds(&self, comm: &dyn Communicator) -> BoundingBox {
        let local = self.bounds();
        let mut lower = [local.min_x, local.min_y];
        let mut upper = [local.max_x, local.max_y];
        comm.all_reduce_min(&mut lower);
        comm.all_reduce_max(&mut upper);
        BoundingBox::new(lower[0], lower[1], upper[0], upper[1])
    }

    /// 是否为同一个函数空间实例
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// 在本函数空间上创建零值场
    pub fn create_field(&self, name: impl Into<String>, levels: usize) -> Field {
        Field::zeros(name, levels, self.size())
    }

    /// 检查场的水平尺寸是否与本函数空间一致
    pub fn check_field(&self, field: &Field) -> FieldResult<()> {
        if field.n_points() != self.size() {
            return Err(FieldError::SizeMismatch {
                name: field.name().to_string(),
                space: self.name().to_string(),
                expected: self.size(),
                actual: field.n_points(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for FunctionSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.kind {
            SpaceKind::PointCloud => {
                write!(f, "{}(点云, {} 点)", self.inner.name, self.size())
            }
            SpaceKind::RegularGrid { nx, ny } => {
                write!(f, "{}(规则网格 {}x{})", self.inner.name, nx, ny)
            }
        }
    }
}
