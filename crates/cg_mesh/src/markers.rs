// crates/cg_mesh/src/markers.rs

//! 标记函数与区域标记集
//!
//! [`MarkerFunction`] 给固定拓扑维度的每个网格实体一个整数标签，
//! 0 表示"未标记"。[`MarkerSet`] 把区域名映射到 (标签, 维度)，
//! 转换时建立一次，之后不可变。
//!
//! # 哨兵策略
//!
//! 上游生成器不保证保留 0 作为未标记值。转换管线采用的约定：
//! 匹配后，每个 0/1/2 维标记数组中观测到的最大值被视为"无区域"
//! 哨兵并重置为 0（[`apply_unmarked_sentinel`]）。未匹配实体填充
//! [`UNSET_TAG`]，在实际网格上最大值总是该填充值。该策略对非连续
//! 标签脆弱，集中保留在此处，勿在别处复制。
//!
//! [`apply_unmarked_sentinel`]: MarkerFunction::apply_unmarked_sentinel

use cg_foundation::{CgError, CgResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 未标记实体的标签值
pub const UNMARKED: u32 = 0;

/// 匹配阶段未命中实体的填充值
///
/// 取 `u32::MAX` 使其在任何实际标签集中都是最大值，
/// 从而被哨兵重置捕获。
pub const UNSET_TAG: u32 = u32::MAX;

// ============================================================================
// 标记函数
// ============================================================================

/// 单一拓扑维度的逐实体整数标记
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerFunction {
    /// 拓扑维度
    dim: u8,
    /// 逐实体标签
    values: Vec<u32>,
}

impl MarkerFunction {
    /// 创建全部未标记的标记函数
    pub fn unmarked(dim: u8, n_entities: usize) -> Self {
        Self {
            dim,
            values: vec![UNMARKED; n_entities],
        }
    }

    /// 创建全部为填充值的标记函数（匹配前的初始状态）
    pub fn unset(dim: u8, n_entities: usize) -> Self {
        Self {
            dim,
            values: vec![UNSET_TAG; n_entities],
        }
    }

    /// 从既有标签数组构建
    pub fn from_values(dim: u8, values: Vec<u32>) -> Self {
        Self { dim, values }
    }

    /// 拓扑维度
    #[inline]
    pub fn dim(&self) -> u8 {
        self.dim
    }

    /// 实体数量
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 读取实体标签
    #[inline]
    pub fn get(&self, entity: usize) -> u32 {
        self.values[entity]
    }

    /// 设置实体标签
    #[inline]
    pub fn set(&mut self, entity: usize, tag: u32) {
        self.values[entity] = tag;
    }

    /// 全部标签
    #[inline]
    pub fn values(&self) -> &[u32] {
        &self.values
    }

    /// 带指定标签的实体索引迭代器
    pub fn entities_with_tag(&self, tag: u32) -> impl Iterator<Item = usize> + '_ {
        self.values
            .iter()
            .enumerate()
            .filter(move |(_, &v)| v == tag)
            .map(|(i, _)| i)
    }

    /// 带指定标签的实体数量
    pub fn count_tag(&self, tag: u32) -> usize {
        self.values.iter().filter(|&&v| v == tag).count()
    }

    /// 哨兵重置：观测到的最大标签值视为"无区域"，重置为 0
    ///
    /// 返回被重置的实体数量。
    pub fn apply_unmarked_sentinel(&mut self) -> usize {
        let Some(&max) = self.values.iter().max() else {
            return 0;
        };
        if max == UNMARKED {
            return 0;
        }
        let mut n = 0;
        for v in &mut self.values {
            if *v == max {
                *v = UNMARKED;
                n += 1;
            }
        }
        n
    }
}

// ============================================================================
// 标记集
// ============================================================================

/// 区域名 → (标签, 维度)
///
/// 序列化为 `{"NAME": [tag, dim], ...}`，与 markers.json 布局一致。
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarkerSet {
    regions: BTreeMap<String, (u32, u8)>,
}

impl MarkerSet {
    /// 创建空标记集
    pub fn new() -> Self {
        Self::default()
    }

    /// 从 (名称, 标签, 维度) 列表构建
    ///
    /// 同一维度内标签必须两两不同（区域不相交的前提）。
    pub fn from_regions(regions: &[(String, u32, u8)]) -> CgResult<Self> {
        let mut set = Self::new();
        for (name, tag, dim) in regions {
            set.insert(name.clone(), *tag, *dim)?;
        }
        Ok(set)
    }

    /// 插入一个区域
    pub fn insert(&mut self, name: String, tag: u32, dim: u8) -> CgResult<()> {
        for (other, &(t, d)) in &self.regions {
            if d == dim && t == tag && *other != name {
                return Err(CgError::conversion(format!(
                    "regions '{}' and '{}' share tag {} in dimension {}",
                    other, name, tag, dim
                )));
            }
        }
        self.regions.insert(name, (tag, dim));
        Ok(())
    }

    /// 查找区域
    pub fn get(&self, name: &str) -> Option<(u32, u8)> {
        self.regions.get(name).copied()
    }

    /// 必须存在的区域，缺失时报配置错误
    pub fn require(&self, name: &str) -> CgResult<(u32, u8)> {
        self.get(name)
            .ok_or_else(|| CgError::config(format!("marker set has no region '{}'", name)))
    }

    /// 区域数量
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// 迭代全部区域
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32, u8)> {
        self.regions.iter().map(|(n, &(t, d))| (n.as_str(), t, d))
    }
}

// ============================================================================
// 测试
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unmarked_default() {
        let f = MarkerFunction::unmarked(2, 5);
        assert_eq!(f.dim(), 2);
        assert_eq!(f.len(), 5);
        assert!(f.values().iter().all(|&v| v == UNMARKED));
    }

    #[test]
    fn test_entities_with_tag() {
        let mut f = MarkerFunction::unmarked(2, 4);
        f.set(1, 7);
        f.set(3, 7);
        let hits: Vec<usize> = f.entities_with_tag(7).collect();
        assert_eq!(hits, vec![1, 3]);
        assert_eq!(f.count_tag(7), 2);
    }

    #[test]
    fn test_sentinel_resets_fill() {
        // 匹配后的典型状态：部分实体带真实标签，其余为 UNSET_TAG 填充
        let mut f = MarkerFunction::from_values(2, vec![1, 2, UNSET_TAG, UNSET_TAG, 6]);
        let n = f.apply_unmarked_sentinel();
        assert_eq!(n, 2);
        assert_eq!(f.values(), &[1, 2, 0, 0, 6]);
    }

    #[test]
    fn test_sentinel_clobbers_largest_real_tag_when_fully_tagged() {
        // 文档化的脆弱性：全部实体都被标记时，最大真实标签被清零
        let mut f = MarkerFunction::from_values(2, vec![1, 2, 3, 3]);
        f.apply_unmarked_sentinel();
        assert_eq!(f.values(), &[1, 2, 0, 0]);
    }

    #[test]
    fn test_sentinel_noop_on_all_unmarked() {
        let mut f = MarkerFunction::unmarked(1, 3);
        assert_eq!(f.apply_unmarked_sentinel(), 0);
        assert_eq!(f.values(), &[0, 0, 0]);
    }

    #[test]
    fn test_marker_set_roundtrip_json() {
        let set = MarkerSet::from_regions(&[
            ("Y0".into(), 1, 2),
            ("Y1".into(), 2, 2),
            ("MYOCARDIUM".into(), 7, 3),
        ])
        .unwrap();

        let json = serde_json::to_string(&set).unwrap();
        let parsed: MarkerSet = serde_json::from_str(&json).unwrap();
        assert_eq!(set, parsed);
        assert_eq!(parsed.get("Y0"), Some((1, 2)));
    }

    #[test]
    fn test_marker_set_rejects_duplicate_tag_same_dim() {
        let err = MarkerSet::from_regions(&[("A".into(), 1, 2), ("B".into(), 1, 2)]);
        assert!(err.is_err());
    }

    #[test]
    fn test_marker_set_allows_same_tag_other_dim() {
        let set =
            MarkerSet::from_regions(&[("A".into(), 1, 2), ("B".into(), 1, 3)]).unwrap();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_require_missing_region() {
        let set = MarkerSet::new();
        assert!(set.require("ENDO").is_err());
    }
}
