// crates/mh_fieldset/src/geometry.rs

//! 几何类型定义
//!
//! 函数空间使用的二维点与边界框。坐标可以是投影坐标，也可以是经纬度
//! (x 为经度，y 为纬度)；插值只使用平面欧氏距离。

use serde::{Deserialize, Serialize};

/// 2D点
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    /// X坐标（或经度）
    pub x: f64,
    /// Y坐标（或纬度）
    pub y: f64,
}

impl Point2D {
    /// 创建新的2D点
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// 平方距离
    #[inline]
    #[must_use]
    pub fn distance_squared_to(&self, other: &Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// 欧几里得距离
    #[inline]
    #[must_use]
    pub fn distance_to(&self, other: &Self) -> f64 {
        self.distance_squared_to(other).sqrt()
    }

    /// 转换为数组
    #[inline]
    #[must_use]
    pub const fn to_array(self) -> [f64; 2] {
        [self.x, self.y]
    }
}

impl From<[f64; 2]> for Point2D {
    fn from(p: [f64; 2]) -> Self {
        Self::new(p[0], p[1])
    }
}

/// 边界框
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// 最小 x
    pub min_x: f64,
    /// 最小 y
    pub min_y: f64,
    /// 最大 x
    pub max_x: f64,
    /// 最大 y
    pub max_y: f64,
}

impl BoundingBox {
    /// 创建新的边界框（自动整理上下界）
    #[must_use]
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x: min_x.min(max_x),
            min_y: min_y.min(max_y),
            max_x: min_x.max(max_x),
            max_y: min_y.max(max_y),
        }
    }

    /// 点集的包围盒，空点集返回 None
    #[must_use]
    pub fn from_points(points: &[Point2D]) -> Option<Self> {
        let first = points.first()?;
        let mut bbox = Self::new(first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            bbox.min_x = bbox.min_x.min(p.x);
            bbox.min_y = bbox.min_y.min(p.y);
            bbox.max_x = bbox.max_x.max(p.x);
            bbox.max_y = bbox.max_y.max(p.y);
        }
        Some(bbox)
    }

    /// 检查点是否在边界框内
    #[must_use]
    pub fn contains_point(&self, point: &Point2D) -> bool {
        point.x >= self.min_x
            && point.x <= self.max_x
            && point.y >= self.min_y
            && point.y <= self.max_y
    }

    /// 计算宽度
    #[must_use]
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// 计算高度
    #[must_use]
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}
