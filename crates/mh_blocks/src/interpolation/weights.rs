// crates/mh_blocks/src/interpolation/weights.rs

//! 插值权重计算
//!
//! 为每个目标点计算一组 (源点索引, 权重)，组装为 CSR 矩阵。
//! 所有方法的权重都非负且每行之和为 1，因此正向插值结果
//! 总落在源值的 [min, max] 范围内，不会过冲。
//!
//! # 方法
//!
//! | 方法 | 每行权重数 | 源函数空间要求 |
//! |------|-----------|---------------|
//! | 最近邻 | 1 | 任意点云 |
//! | 反距离加权 | k | 任意点云 |
//! | 双线性 | ≤ 4 | 规则网格 |
//!
//! 近邻搜索使用 R-tree，构造复杂度 O(n log n)，每次查询 O(k log n)。

use rstar::primitives::GeomWithData;
use rstar::RTree;
use serde::{Deserialize, Serialize};

use mh_fieldset::{FieldError, FieldResult, FunctionSpace, Point2D, SpaceKind};

use super::csr::{CsrBuilder, CsrMatrix};

/// 小于此距离视为与源点重合
pub const DISTANCE_TOLERANCE: f64 = 1e-10;

type IndexedPoint = GeomWithData<[f64; 2], usize>;

/// 插值方法
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InterpolationMethod {
    /// 最近邻
    Nearest,
    /// 反距离加权
    InverseDistance {
        /// 距离指数 (p)
        #[serde(default = "default_power")]
        power: f64,
        /// 参与加权的最近源点数
        #[serde(default = "default_neighbors")]
        neighbors: usize,
    },
    /// 双线性（源必须为规则网格）
    Bilinear,
}

fn default_power() -> f64 {
    2.0
}

fn default_neighbors() -> usize {
    4
}

impl Default for InterpolationMethod {
    fn default() -> Self {
        Self::InverseDistance {
            power: default_power(),
            neighbors: default_neighbors(),
        }
    }
}

impl InterpolationMethod {
    /// 获取方法名称
    pub fn name(&self) -> &'static str {
        match self {
            Self::Nearest => "nearest",
            Self::InverseDistance { .. } => "inverse_distance",
            Self::Bilinear => "bilinear",
        }
    }

    /// 检查参数
    pub fn validate(&self) -> Result<(), String> {
        if let Self::InverseDistance { power, neighbors } = *self {
            if !(power.is_finite() && power > 0.0) {
                return Err(format!("距离指数必须为正: {}", power));
            }
            if neighbors == 0 {
                return Err("邻居数必须 ≥ 1".to_string());
            }
        }
        Ok(())
    }
}

/// 计算源 → 目标的插值权重矩阵 (n_target × n_source)
pub fn compute_weights(
    method: InterpolationMethod,
    source: &FunctionSpace,
    target: &FunctionSpace,
) -> FieldResult<CsrMatrix> {
    method
        .validate()
        .map_err(|msg| FieldError::invalid_space(source.name(), msg))?;

    let mut builder = CsrBuilder::new(target.size(), source.size());

    match method {
        InterpolationMethod::Nearest => {
            let tree = build_tree(source.points());
            for (row, p) in target.points().iter().enumerate() {
                if let Some(nearest) = tree.nearest_neighbor(&p.to_array()) {
                    builder.add(row, nearest.data, 1.0);
                }
            }
        }
        InterpolationMethod::InverseDistance { power, neighbors } => {
            let tree = build_tree(source.points());
            let k = neighbors.min(source.size());
            let mut found: Vec<(usize, f64)> = Vec::with_capacity(k);
            for (row, p) in target.points().iter().enumerate() {
                found.clear();
                found.extend(
                    tree.nearest_neighbor_iter(&p.to_array())
                        .take(k)
                        .map(|n| (n.data, p.distance_to(&Point2D::from(*n.geom())))),
                );
                for (col, w) in idw_weights(&found, power) {
                    builder.add(row, col, w);
                }
            }
        }
        InterpolationMethod::Bilinear => {
            let SpaceKind::RegularGrid { nx, ny } = source.kind() else {
                return Err(FieldError::invalid_space(
                    source.name(),
                    "双线性插值要求源函数空间为规则网格",
                ));
            };
            let locator = GridLocator::new(source, nx, ny);
            for (row, p) in target.points().iter().enumerate() {
                for (col, w) in locator.bilinear_weights(p) {
                    if w > 0.0 {
                        builder.add(row, col, w);
                    }
                }
            }
        }
    }

    Ok(builder.build())
}

fn build_tree(points: &[Point2D]) -> RTree<IndexedPoint> {
    RTree::bulk_load(
        points
            .iter()
            .enumerate()
            .map(|(i, p)| GeomWithData::new(p.to_array(), i))
            .collect(),
    )
}

/// 反距离加权归一化权重
///
/// 最近点距离小于容差时，该点权重为 1。
fn idw_weights(found: &[(usize, f64)], power: f64) -> Vec<(usize, f64)> {
    if let Some(&(idx, _)) = found.iter().find(|&&(_, d)| d < DISTANCE_TOLERANCE) {
        return vec![(idx, 1.0)];
    }

    let raw: Vec<(usize, f64)> = found
        .iter()
        .map(|&(idx, d)| (idx, 1.0 / d.powf(power)))
        .collect();
    let total: f64 = raw.iter().map(|&(_, w)| w).sum();
    if !(total > 0.0 && total.is_finite()) {
        // 距离极大导致权重下溢，退化为最近点
        return found.first().map(|&(idx, _)| vec![(idx, 1.0)]).unwrap_or_default();
    }
    raw.into_iter().map(|(idx, w)| (idx, w / total)).collect()
}

/// 规则网格定位器
struct GridLocator {
    nx: usize,
    ny: usize,
    min_x: f64,
    min_y: f64,
    dx: f64,
    dy: f64,
}

impl GridLocator {
    fn new(source: &FunctionSpace, nx: usize, ny: usize) -> Self {
        let bounds = source.bounds();
        let dx = if nx > 1 { bounds.width() / (nx - 1) as f64 } else { 0.0 };
        let dy = if ny > 1 { bounds.height() / (ny - 1) as f64 } else { 0.0 };
        Self {
            nx,
            ny,
            min_x: bounds.min_x,
            min_y: bounds.min_y,
            dx,
            dy,
        }
    }

    /// 沿一个方向定位：返回 (下标 i0, 下标 i1, 局部坐标 t ∈ [0, 1])
    ///
    /// 网格外的点截断到边界，保证权重非负。
    fn locate(coord: f64, origin: f64, step: f64, n: usize) -> (usize, usize, f64) {
        if n == 1 || step <= 0.0 {
            return (0, 0, 0.0);
        }
        let f = ((coord - origin) / step).clamp(0.0, (n - 1) as f64);
        let i0 = (f.floor() as usize).min(n - 2);
        (i0, i0 + 1, f - i0 as f64)
    }

    fn bilinear_weights(&self, p: &Point2D) -> [(usize, f64); 4] {
        let (i0, i1, tx) = Self::locate(p.x, self.min_x, self.dx, self.nx);
        let (j0, j1, ty) = Self::locate(p.y, self.min_y, self.dy, self.ny);
        let idx = |i: usize, j: usize| j * self.nx + i;
        [
            (idx(i0, j0), (1.0 - tx) * (1.0 - ty)),
            (idx(i1, j0), tx * (1.0 - ty)),
            (idx(i0, j1), (1.0 - tx) * ty),
            (idx(i1, j1), tx * ty),
        ]
    }
}
