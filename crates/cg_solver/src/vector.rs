// crates/cg_solver/src/vector.rs

//! 分布式向量
//!
//! 按 [`DofLayout`] 布局的分区局部存储：每个点自由度 `block` 个
//! 交错分量（标量 1，向量 3 即 x/y/z）。本分区只写自己 owned 的
//! 槽位，然后通过阻塞集合 [`sync_insert`] 把 owner 的权威值推送
//! 到所有副本。同步后同一全局自由度的 owned 与 ghost 副本逐位
//! 一致。
//!
//! [`sync_insert`]: DistributedVector::sync_insert

use crate::space::{DofLayout, FunctionSpace};
use crate::world::{Communicator, ExchangeValue};
use cg_foundation::{CgError, CgResult};
use std::collections::HashMap;

/// 分布式向量
#[derive(Debug, Clone, PartialEq)]
pub struct DistributedVector {
    block: usize,
    values: Vec<f64>,
}

impl DistributedVector {
    /// 为函数空间创建零向量
    pub fn zeros(space: &FunctionSpace) -> Self {
        Self {
            block: space.block_size(),
            values: vec![0.0; space.block_size() * space.layout().n_points()],
        }
    }

    /// 块大小
    #[inline]
    pub fn block(&self) -> usize {
        self.block
    }

    /// 点自由度数量
    #[inline]
    pub fn n_points(&self) -> usize {
        self.values.len() / self.block
    }

    /// 底层存储（交错布局）
    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// 底层可变存储
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.values
    }

    /// 点的分量
    #[inline]
    pub fn point(&self, point: usize) -> &[f64] {
        &self.values[point * self.block..(point + 1) * self.block]
    }

    /// 写入点的分量
    pub fn set_point(&mut self, point: usize, vals: &[f64]) {
        debug_assert_eq!(vals.len(), self.block);
        self.values[point * self.block..(point + 1) * self.block].copy_from_slice(vals);
    }

    /// 阻塞 "insert" 同步
    ///
    /// 发布本分区 owned 且共享的点的权威值，接收 ghost 点的权威值。
    /// 返回后每个共享自由度在所有分区上的副本一致。
    pub fn sync_insert<C: Communicator>(
        &mut self,
        layout: &DofLayout,
        comm: &C,
    ) -> CgResult<()> {
        let mut publish: HashMap<u64, ExchangeValue> = HashMap::new();
        for l in layout.owned_points() {
            if layout.is_shared(l) {
                let mut v: ExchangeValue = [0.0; 3];
                v[..self.block].copy_from_slice(self.point(l));
                publish.insert(layout.global_of(l), v);
            }
        }

        let want = layout.ghost_globals();
        let got = comm.insert_exchange(&publish, &want)?;

        for &g in &want {
            let Some(v) = got.get(&g) else {
                return Err(comm.bail(format!("no owner published ghost dof {}", g)));
            };
            let Some(l) = layout.local_of_global(g) else {
                return Err(comm.bail(format!("ghost dof {} missing from layout", g)));
            };
            let block = self.block;
            self.set_point(l, &v[..block]);
        }
        Ok(())
    }
}

// ============================================================================
// 测试
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::MeshPartition;
    use crate::space::{FiberSpace, FunctionSpace};
    use crate::world::SerialComm;
    use cg_mesh::mesh::DomainMesh;
    use glam::DVec3;

    fn single_tet_space() -> FunctionSpace {
        let nodes = vec![
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
            DVec3::new(0.0, 0.0, 1.0),
        ];
        let mesh = DomainMesh::from_tets(nodes, vec![[0, 1, 2, 3]]).unwrap();
        let p = MeshPartition::serial(&mesh);
        FunctionSpace::vector(&p, FiberSpace::P1)
    }

    #[test]
    fn test_zeros_and_set_point() {
        let space = single_tet_space();
        let mut v = DistributedVector::zeros(&space);
        assert_eq!(v.block(), 3);
        assert_eq!(v.n_points(), 4);

        v.set_point(2, &[1.0, 2.0, 3.0]);
        assert_eq!(v.point(2), &[1.0, 2.0, 3.0]);
        assert_eq!(v.point(0), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_serial_sync_is_noop() {
        let space = single_tet_space();
        let mut v = DistributedVector::zeros(&space);
        v.set_point(0, &[0.5, 0.5, 0.5]);
        let before = v.clone();

        v.sync_insert(space.layout(), &SerialComm).unwrap();
        assert_eq!(v, before);
    }
}
