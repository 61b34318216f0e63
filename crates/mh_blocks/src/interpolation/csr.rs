// crates/mh_blocks/src/interpolation/csr.rs

//! 压缩稀疏行（CSR）插值权重矩阵
//!
//! 行对应目标点，列对应源点。正向插值为 `y = W x`，
//! 伴随为 `x = Wᵀ y`，两者共用同一份权重，伴随恒等式因此严格成立
//! （仅受浮点舍入影响）。
//!
//! # 特性开关
//!
//! - `parallel`: 启用基于 `rayon` 的并行矩阵-向量乘法（行之间相互独立，
//!   每行内部求和顺序不变，结果与串行版本逐位相同）
//!
//! # 格式说明
//!
//! CSR 使用三个数组存储：
//! - `row_ptr`: 行指针，长度 n_rows + 1，row_ptr[i] 是第 i 行第一个非零元的索引
//! - `col_idx`: 列索引，与非零元一一对应，行内有序
//! - `values`: 非零元值

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use std::collections::BTreeMap;

/// 并行乘法的最小行数
#[cfg(feature = "parallel")]
const PARALLEL_THRESHOLD: usize = 2000;

/// CSR 格式稀疏矩阵（f64）
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
    n_rows: usize,
    n_cols: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<f64>,
}

impl CsrMatrix {
    /// 获取行数
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// 获取列数
    #[inline]
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// 获取非零元数量
    #[inline]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// 获取值切片
    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// 获取行指针
    #[inline]
    pub fn row_ptr(&self) -> &[usize] {
        &self.row_ptr
    }

    /// 获取 (row, col) 位置的值（如果不存在返回 0）
    pub fn get(&self, row: usize, col: usize) -> f64 {
        let start = self.row_ptr[row];
        let end = self.row_ptr[row + 1];
        match self.col_idx[start..end].binary_search(&col) {
            Ok(local) => self.values[start + local],
            Err(_) => 0.0,
        }
    }

    /// 矩阵-向量乘法 y = A * x
    ///
    /// # Panics
    /// - `x.len() != self.n_cols()`
    /// - `y.len() != self.n_rows()`
    pub fn mul_vec(&self, x: &[f64], y: &mut [f64]) {
        assert_eq!(x.len(), self.n_cols, "x 长度必须等于矩阵列数");
        assert_eq!(y.len(), self.n_rows, "y 长度必须等于矩阵行数");

        #[cfg(feature = "parallel")]
        if self.n_rows >= PARALLEL_THRESHOLD {
            y.par_iter_mut().enumerate().for_each(|(row, out)| {
                *out = self.row_dot(row, x);
            });
            return;
        }

        for (row, out) in y.iter_mut().enumerate() {
            *out = self.row_dot(row, x);
        }
    }

    /// 转置矩阵-向量乘法 x = Aᵀ * y
    ///
    /// 输出先清零再散射累加。散射写入存在冲突，因此始终串行执行。
    ///
    /// # Panics
    /// - `y.len() != self.n_rows()`
    /// - `x.len() != self.n_cols()`
    pub fn mul_vec_transpose(&self, y: &[f64], x: &mut [f64]) {
        assert_eq!(y.len(), self.n_rows, "y 长度必须等于矩阵行数");
        assert_eq!(x.len(), self.n_cols, "x 长度必须等于矩阵列数");

        x.fill(0.0);
        for (row, &yr) in y.iter().enumerate() {
            if yr == 0.0 {
                continue;
            }
            let start = self.row_ptr[row];
            let end = self.row_ptr[row + 1];
            for idx in start..end {
                x[self.col_idx[idx]] += self.values[idx] * yr;
            }
        }
    }

    #[inline]
    fn row_dot(&self, row: usize, x: &[f64]) -> f64 {
        let start = self.row_ptr[row];
        let end = self.row_ptr[row + 1];
        let mut sum = 0.0;
        for idx in start..end {
            sum += self.values[idx] * x[self.col_idx[idx]];
        }
        sum
    }

    /// 各行之和
    pub fn row_sums(&self) -> Vec<f64> {
        (0..self.n_rows)
            .map(|row| self.values[self.row_ptr[row]..self.row_ptr[row + 1]].iter().sum())
            .collect()
    }

    /// 各列之和（即 Aᵀ 的行和）
    pub fn column_sums(&self) -> Vec<f64> {
        let mut sums = vec![0.0; self.n_cols];
        for (&col, &v) in self.col_idx.iter().zip(self.values.iter()) {
            sums[col] += v;
        }
        sums
    }

    /// 每行非零元数的 (最小, 最大)
    pub fn row_nnz_range(&self) -> (usize, usize) {
        let mut lo = usize::MAX;
        let mut hi = 0;
        for w in self.row_ptr.windows(2) {
            let n = w[1] - w[0];
            lo = lo.min(n);
            hi = hi.max(n);
        }
        if self.n_rows == 0 {
            lo = 0;
        }
        (lo, hi)
    }
}

/// CSR 矩阵构建器
///
/// 使用 BTreeMap 临时存储，构建时转换为紧凑 CSR 格式。
/// 同一位置多次 `add` 会累加（最近邻重合点等情况）。
pub struct CsrBuilder {
    n_rows: usize,
    n_cols: usize,
    rows: Vec<BTreeMap<usize, f64>>,
}

impl CsrBuilder {
    /// 创建构建器
    pub fn new(n_rows: usize, n_cols: usize) -> Self {
        Self {
            n_rows,
            n_cols,
            rows: vec![BTreeMap::new(); n_rows],
        }
    }

    /// 累加到 (row, col)
    ///
    /// # Panics
    /// - `row >= n_rows`
    /// - `col >= n_cols`
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        assert!(row < self.n_rows, "行索引越界");
        assert!(col < self.n_cols, "列索引越界");
        *self.rows[row].entry(col).or_insert(0.0) += value;
    }

    /// 获取当前非零元总数
    pub fn nnz(&self) -> usize {
        self.rows.iter().map(|r| r.len()).sum()
    }

    /// 构建 CSR 矩阵（消耗构建器）
    pub fn build(self) -> CsrMatrix {
        let nnz = self.nnz();
        let mut row_ptr = Vec::with_capacity(self.n_rows + 1);
        let mut col_idx = Vec::with_capacity(nnz);
        let mut values = Vec::with_capacity(nnz);

        row_ptr.push(0);
        for row_map in self.rows {
            for (col, val) in row_map {
                col_idx.push(col);
                values.push(val);
            }
            row_ptr.push(col_idx.len());
        }

        CsrMatrix {
            n_rows: self.n_rows,
            n_cols: self.n_cols,
            row_ptr,
            col_idx,
            values,
        }
    }
}
