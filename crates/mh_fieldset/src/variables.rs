// crates/mh_fieldset/src/variables.rs

//! 变量集
//!
//! 有序、名称唯一的物理量集合，每个变量附带垂直层数（≥ 1）。
//! 相等比较与顺序无关：两个变量集包含相同的 (名称, 层数) 即相等。

use serde::{Deserialize, Serialize};

use crate::error::{FieldError, FieldResult};

/// 单个变量：名称 + 垂直层数
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Variable {
    /// 变量名
    pub name: String,
    /// 垂直层数
    pub levels: usize,
}

impl Variable {
    /// 创建变量
    pub fn new(name: impl Into<String>, levels: usize) -> Self {
        Self {
            name: name.into(),
            levels,
        }
    }
}

/// 变量集
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<Variable>", into = "Vec<Variable>")]
pub struct VariableSet {
    vars: Vec<Variable>,
}

impl VariableSet {
    /// 创建空变量集
    pub fn new() -> Self {
        Self::default()
    }

    /// 从 (名称, 层数) 列表创建
    ///
    /// 名称重复或层数为 0 时返回错误。
    pub fn from_pairs<I, S>(pairs: I) -> FieldResult<Self>
    where
        I: IntoIterator<Item = (S, usize)>,
        S: Into<String>,
    {
        let mut set = Self::new();
        for (name, levels) in pairs {
            set.push(Variable::new(name, levels))?;
        }
        Ok(set)
    }

    /// 追加变量
    pub fn push(&mut self, var: Variable) -> FieldResult<()> {
        if var.levels == 0 {
            return Err(FieldError::InvalidLevels {
                name: var.name,
                levels: 0,
            });
        }
        if self.has(&var.name) {
            return Err(FieldError::DuplicateVariable { name: var.name });
        }
        self.vars.push(var);
        Ok(())
    }

    /// 是否包含变量
    #[inline]
    pub fn has(&self, name: &str) -> bool {
        self.vars.iter().any(|v| v.name == name)
    }

    /// 变量层数
    #[inline]
    pub fn levels(&self, name: &str) -> Option<usize> {
        self.vars.iter().find(|v| v.name == name).map(|v| v.levels)
    }

    /// 变量数量
    #[inline]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// 是否为空
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// 按声明顺序迭代
    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.vars.iter()
    }

    /// 所有变量名（声明顺序）
    pub fn names(&self) -> Vec<&str> {
        self.vars.iter().map(|v| v.name.as_str()).collect()
    }

    /// 并集：保持 self 的顺序，再追加 other 中新出现的变量
    ///
    /// 同名变量层数不一致时返回 `LevelConflict`。
    pub fn union(&self, other: &Self) -> FieldResult<Self> {
        let mut out = self.clone();
        for var in &other.vars {
            match self.levels(&var.name) {
                Some(levels) if levels != var.levels => {
                    return Err(FieldError::LevelConflict {
                        name: var.name.clone(),
                        left: levels,
                        right: var.levels,
                    });
                }
                Some(_) => {}
                None => out.vars.push(var.clone()),
            }
        }
        Ok(out)
    }

    /// 交集：保持 self 的顺序
    pub fn intersection(&self, other: &Self) -> Self {
        Self {
            vars: self
                .vars
                .iter()
                .filter(|v| other.has(&v.name))
                .cloned()
                .collect(),
        }
    }

    /// 是否为 other 的子集（名称与层数都需匹配）
    pub fn is_subset_of(&self, other: &Self) -> bool {
        self.vars
            .iter()
            .all(|v| other.levels(&v.name) == Some(v.levels))
    }

    /// 将某个变量替换为另一个（保持位置与层数）
    ///
    /// 被替换变量不存在时原样返回。
    pub fn renamed(&self, from: &str, to: &str) -> FieldResult<Self> {
        let mut out = Self::new();
        for var in &self.vars {
            let name = if var.name == from { to } else { var.name.as_str() };
            out.push(Variable::new(name, var.levels))?;
        }
        Ok(out)
    }
}

impl PartialEq for VariableSet {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.is_subset_of(other)
    }
}

impl Eq for VariableSet {}

impl TryFrom<Vec<Variable>> for VariableSet {
    type Error = FieldError;

    fn try_from(vars: Vec<Variable>) -> FieldResult<Self> {
        let mut set = Self::new();
        for var in vars {
            set.push(var)?;
        }
        Ok(set)
    }
}

impl From<VariableSet> for Vec<Variable> {
    fn from(set: VariableSet) -> Self {
        set.vars
    }
}

impl std::fmt::Display for VariableSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, v) in self.vars.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}({})", v.name, v.levels)?;
        }
        write!(f, "]")
    }
}
