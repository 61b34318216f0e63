// crates/mh_fieldset/src/field.rs

//! 多层场与场集合
//!
//! `Field` 是一个形状为 (层数 × 水平点数) 的数组，按层优先存储：
//! `data[level * n_points + point]`。各层在水平插值中相互独立，
//! 按层切片可以直接交给稀疏矩阵-向量乘法。
//!
//! `FieldSet` 是按名称索引、保持插入顺序的场集合（即算子链中流动的"bundle"）。
//! 一个集合中的所有场总是定义在同一个函数空间上。

use crate::comm::{Communicator, Distribution};
use crate::error::{FieldError, FieldResult};
use crate::variables::{Variable, VariableSet};

/// 多层场
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: String,
    levels: usize,
    n_points: usize,
    data: Vec<f64>,
}

impl Field {
    /// 创建零值场
    pub fn zeros(name: impl Into<String>, levels: usize, n_points: usize) -> Self {
        Self::filled(name, levels, n_points, 0.0)
    }

    /// 创建常数场
    pub fn filled(name: impl Into<String>, levels: usize, n_points: usize, value: f64) -> Self {
        Self {
            name: name.into(),
            levels,
            n_points,
            data: vec![value; levels * n_points],
        }
    }

    /// 从已有数据创建（层优先）
    pub fn from_data(
        name: impl Into<String>,
        levels: usize,
        n_points: usize,
        data: Vec<f64>,
    ) -> FieldResult<Self> {
        let name = name.into();
        let expected = levels * n_points;
        if data.len() != expected {
            return Err(FieldError::DataLength {
                name,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            name,
            levels,
            n_points,
            data,
        })
    }

    /// 场名
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 垂直层数
    #[inline]
    pub fn levels(&self) -> usize {
        self.levels
    }

    /// 水平点数
    #[inline]
    pub fn n_points(&self) -> usize {
        self.n_points
    }

    /// (层数, 水平点数)
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.levels, self.n_points)
    }

    /// 对应的变量描述
    pub fn variable(&self) -> Variable {
        Variable::new(self.name.clone(), self.levels)
    }

    /// 全部数据
    #[inline]
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// 全部数据（可变）
    #[inline]
    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// 第 `level` 层
    ///
    /// # Panics
    /// `level >= levels`
    #[inline]
    pub fn level(&self, level: usize) -> &[f64] {
        let start = level * self.n_points;
        &self.data[start..start + self.n_points]
    }

    /// 第 `level` 层（可变）
    ///
    /// # Panics
    /// `level >= levels`
    #[inline]
    pub fn level_mut(&mut self, level: usize) -> &mut [f64] {
        let start = level * self.n_points;
        &mut self.data[start..start + self.n_points]
    }

    /// 读取 (层, 点)
    #[inline]
    pub fn get(&self, level: usize, point: usize) -> f64 {
        self.data[level * self.n_points + point]
    }

    /// 填充常数
    pub fn fill(&mut self, value: f64) {
        self.data.fill(value);
    }

    /// 所有值之和（本地）
    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    /// 最小/最大值，空场返回 None
    pub fn min_max(&self) -> Option<(f64, f64)> {
        let mut iter = self.data.iter().copied();
        let first = iter.next()?;
        Some(iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
    }

    /// 检查形状一致
    pub fn check_same_shape(&self, other: &Self) -> FieldResult<()> {
        if self.shape() != other.shape() {
            return Err(FieldError::ShapeMismatch {
                name: self.name.clone(),
                left: self.shape(),
                right: other.shape(),
            });
        }
        Ok(())
    }

    /// 本地内积
    pub fn dot(&self, other: &Self) -> FieldResult<f64> {
        self.check_same_shape(other)?;
        Ok(self
            .data
            .iter()
            .zip(other.data.iter())
            .map(|(a, b)| a * b)
            .sum())
    }
}

/// 场集合（按插入顺序）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSet {
    fields: Vec<Field>,
}

impl FieldSet {
    /// 创建空集合
    pub fn new() -> Self {
        Self::default()
    }

    /// 预分配容量
    pub fn with_capacity(n: usize) -> Self {
        Self {
            fields: Vec::with_capacity(n),
        }
    }

    /// 添加场，同名场已存在时返回错误
    pub fn add(&mut self, field: Field) -> FieldResult<()> {
        if self.has(field.name()) {
            return Err(FieldError::DuplicateField {
                name: field.name().to_string(),
            });
        }
        self.fields.push(field);
        Ok(())
    }

    /// 添加或覆盖同名场
    pub fn insert(&mut self, field: Field) {
        match self.fields.iter_mut().find(|f| f.name() == field.name()) {
            Some(slot) => *slot = field,
            None => self.fields.push(field),
        }
    }

    /// 是否包含场
    #[inline]
    pub fn has(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name() == name)
    }

    /// 按名称获取
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name() == name)
    }

    /// 按名称获取（可变）
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Field> {
        self.fields.iter_mut().find(|f| f.name() == name)
    }

    /// 按名称获取，不存在时返回 `MissingField`
    pub fn field(&self, name: &str) -> FieldResult<&Field> {
        self.get(name).ok_or_else(|| FieldError::missing(name))
    }

    /// 移除场
    pub fn remove(&mut self, name: &str) -> Option<Field> {
        let pos = self.fields.iter().position(|f| f.name() == name)?;
        Some(self.fields.remove(pos))
    }

    /// 整体替换内容
    ///
    /// 旧内容被丢弃，集合不会在多次调用之间累积。
    pub fn replace_with(&mut self, other: FieldSet) {
        *self = other;
    }

    /// 场数量
    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// 是否为空
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// 迭代
    pub fn iter(&self) -> std::slice::Iter<'_, Field> {
        self.fields.iter()
    }

    /// 可变迭代
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Field> {
        self.fields.iter_mut()
    }

    /// 场名（插入顺序）
    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name()).collect()
    }

    /// 集合对应的变量集
    pub fn variables(&self) -> VariableSet {
        // 集合内名称唯一，层数 ≥ 1 的场才可能构成合法变量
        let mut set = VariableSet::new();
        for f in &self.fields {
            if set.push(f.variable()).is_err() {
                log::warn!("场 {} 层数为 0，不计入变量集", f.name());
            }
        }
        set
    }

    /// 为每个变量在给定水平尺寸上创建零值场
    pub fn zeros_like(vars: &VariableSet, n_points: usize) -> Self {
        let mut set = Self::with_capacity(vars.len());
        for v in vars.iter() {
            set.fields.push(Field::zeros(v.name.clone(), v.levels, n_points));
        }
        set
    }

    /// 本地内积：两个集合的场名与形状必须一致
    pub fn local_dot(&self, other: &Self) -> FieldResult<f64> {
        if self.len() != other.len() {
            let missing = self
                .fields
                .iter()
                .map(|f| f.name())
                .find(|n| !other.has(n))
                .or_else(|| other.fields.iter().map(|f| f.name()).find(|n| !self.has(n)))
                .unwrap_or("");
            return Err(FieldError::missing(missing));
        }
        let mut total = 0.0;
        for f in &self.fields {
            total += f.dot(other.field(f.name())?)?;
        }
        Ok(total)
    }

    /// 全局内积
    ///
    /// 分块数据做全局归约；复制数据直接使用本地结果。
    pub fn dot(
        &self,
        other: &Self,
        comm: &dyn Communicator,
        distribution: Distribution,
    ) -> FieldResult<f64> {
        let local = self.local_dot(other)?;
        Ok(match distribution {
            Distribution::Replicated => local,
            Distribution::Partitioned => comm.all_reduce_scalar(local),
        })
    }
}

impl IntoIterator for FieldSet {
    type Item = Field;
    type IntoIter = std::vec::IntoIter<Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl<'a> IntoIterator for &'a FieldSet {
    type Item = &'a Field;
    type IntoIter = std::slice::Iter<'a, Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

impl FromIterator<Field> for FieldSet {
    /// 同名场后者覆盖前者
    fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
        let mut set = Self::new();
        for f in iter {
            set.insert(f);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::SerialComm;

    #[test]
    fn test_field_layout_is_level_major() {
        let f = Field::from_data("t", 2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        assert_eq!(f.level(0), &[1.0, 2.0, 3.0]);
        assert_eq!(f.level(1), &[4.0, 5.0, 6.0]);
        assert_eq!(f.get(1, 0), 4.0);
        assert_eq!(f.min_max(), Some((1.0, 6.0)));
    }

    #[test]
    fn test_from_data_length_checked() {
        assert!(matches!(
            Field::from_data("t", 2, 3, vec![0.0; 5]),
            Err(FieldError::DataLength { expected: 6, actual: 5, .. })
        ));
    }

    #[test]
    fn test_fieldset_add_get_remove() {
        let mut set = FieldSet::new();
        set.add(Field::zeros("t", 1, 4)).unwrap();
        set.add(Field::zeros("q", 2, 4)).unwrap();
        assert!(set.add(Field::zeros("t", 1, 4)).is_err());

        assert_eq!(set.names(), vec!["t", "q"]);
        assert_eq!(set.get("q").unwrap().levels(), 2);
        assert!(set.field("ps").is_err());

        let removed = set.remove("t").unwrap();
        assert_eq!(removed.name(), "t");
        assert_eq!(set.len(), 1);
        assert!(set.remove("t").is_none());
    }

    #[test]
    fn test_replace_with_discards_old_fields() {
        let mut set = FieldSet::new();
        set.add(Field::zeros("old", 1, 4)).unwrap();

        let mut replacement = FieldSet::new();
        replacement.add(Field::zeros("new", 1, 9)).unwrap();
        set.replace_with(replacement);

        assert_eq!(set.names(), vec!["new"]);
        assert_eq!(set.get("new").unwrap().n_points(), 9);
    }

    #[test]
    fn test_dot_requires_matching_names() {
        let comm = SerialComm::new();
        let mut a = FieldSet::new();
        a.add(Field::filled("t", 1, 3, 2.0)).unwrap();
        let mut b = FieldSet::new();
        b.add(Field::filled("t", 1, 3, 0.5)).unwrap();

        let d = a.dot(&b, &comm, Distribution::Partitioned).unwrap();
        assert!((d - 3.0).abs() < 1e-14);

        b.add(Field::zeros("q", 1, 3)).unwrap();
        assert!(a.dot(&b, &comm, Distribution::Replicated).is_err());
    }

    #[test]
    fn test_variables_of_fieldset() {
        let set: FieldSet = vec![Field::zeros("t", 3, 2), Field::zeros("q", 1, 2)]
            .into_iter()
            .collect();
        let vars = set.variables();
        assert_eq!(vars.levels("t"), Some(3));
        assert_eq!(vars.levels("q"), Some(1));
    }
}
