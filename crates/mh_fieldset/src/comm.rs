// crates/mh_fieldset/src/comm.rs

//! 通信上下文
//!
//! 水平网格按进程划分为互不相交的分块，每个进程只持有本地分块。
//! 算子块本身不关心划分方式，只通过 [`Communicator`] 做同步的集合归约。
//!
//! 内部（分析）网格较小，在每个进程上完整复制；模式网格按分块分布。
//! 对复制数据求全局内积时不能再做归约，否则会被重复计数，
//! 因此内积需要显式给出 [`Distribution`]。

use std::fmt;

/// 数据在进程间的分布方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distribution {
    /// 每个进程持有完整副本
    Replicated,
    /// 每个进程持有互不相交的分块
    Partitioned,
}

/// 进程间通信接口
///
/// 所有集合操作都是同步阻塞的：要么所有参与者都得到有效结果，要么整体失败。
pub trait Communicator: Send + Sync + fmt::Debug {
    /// 当前进程编号
    fn rank(&self) -> usize;

    /// 进程总数
    fn size(&self) -> usize;

    /// 逐元素全局求和，结果写回 `values`
    fn all_reduce_sum(&self, values: &mut [f64]);

    /// 逐元素全局取最大值，结果写回 `values`
    fn all_reduce_max(&self, values: &mut [f64]);

    /// 逐元素全局取最小值，结果写回 `values`
    fn all_reduce_min(&self, values: &mut [f64]) {
        values.iter_mut().for_each(|v| *v = -*v);
        self.all_reduce_max(values);
        values.iter_mut().for_each(|v| *v = -*v);
    }

    /// 标量全局求和
    fn all_reduce_scalar(&self, value: f64) -> f64 {
        let mut buf = [value];
        self.all_reduce_sum(&mut buf);
        buf[0]
    }

    /// 是否为单进程
    fn is_serial(&self) -> bool {
        self.size() == 1
    }
}

/// 单进程通信器（归约为恒等操作）
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialComm;

impl SerialComm {
    /// 创建单进程通信器
    pub fn new() -> Self {
        Self
    }
}

impl Communicator for SerialComm {
    #[inline]
    fn rank(&self) -> usize {
        0
    }

    #[inline]
    fn size(&self) -> usize {
        1
    }

    #[inline]
    fn all_reduce_sum(&self, _values: &mut [f64]) {}

    #[inline]
    fn all_reduce_max(&self, _values: &mut [f64]) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_comm_is_identity() {
        let comm = SerialComm::new();
        let mut v = [1.0, 2.0, 3.0];
        comm.all_reduce_sum(&mut v);
        assert_eq!(v, [1.0, 2.0, 3.0]);
        assert_eq!(comm.all_reduce_scalar(4.5), 4.5);
        let mut m = [-1.0, 2.0];
        comm.all_reduce_min(&mut m);
        assert_eq!(m, [-1.0, 2.0]);
        assert!(comm.is_serial());
        assert_eq!(comm.rank(), 0);
    }
}
