// crates/cg_solver/src/world.rs

//! SPMD 通信子
//!
//! 执行模型：相同逻辑在每个分区上运行，唯一的同步点是阻塞集合
//! 操作。集合操作失败对整个运行致命：某个分区单方面退出会让
//! 其余分区在栅栏处死锁，因此失败通过"毒化"传播，第一个出错的
//! 分区把错误写入共享状态并唤醒所有等待者，此后每个分区在下一个
//! 集合点观察到同一个错误并一致退出。没有取消，没有超时，不重试。
//!
//! - [`SerialComm`]: 单分区退化情形，集合操作为空操作
//! - [`LocalWorld`]: 进程内多分区世界，每个 rank 一个线程，
//!   用于分区一致性验证

use cg_foundation::{CgError, CgResult};
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::Arc;

/// 集合交换的值类型：最多 3 个分量（标量用第 0 个）
pub type ExchangeValue = [f64; 3];

// ============================================================================
// 通信接口
// ============================================================================

/// SPMD 通信子
pub trait Communicator: Send + Sync {
    /// 本分区序号
    fn rank(&self) -> usize;

    /// 分区总数
    fn n_ranks(&self) -> usize;

    /// 阻塞 insert 集合交换
    ///
    /// 每个分区发布其 owned 共享自由度的权威值（按全局编号键控），
    /// 在所有分区到齐后取回自己 ghost 自由度的值。owner 的值是
    /// 权威值，所有副本在返回后一致。
    fn insert_exchange(
        &self,
        publish: &HashMap<u64, ExchangeValue>,
        want: &[u64],
    ) -> CgResult<HashMap<u64, ExchangeValue>>;

    /// 阻塞栅栏
    fn barrier(&self) -> CgResult<()> {
        self.insert_exchange(&HashMap::new(), &[])?;
        Ok(())
    }

    /// 本分区失败：毒化全域并返回对应错误
    ///
    /// 其余分区在下一个集合点观察到同一错误。
    fn bail(&self, message: String) -> CgError;
}

// ============================================================================
// 串行通信子
// ============================================================================

/// 单分区通信子：集合操作为空操作
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialComm;

impl Communicator for SerialComm {
    fn rank(&self) -> usize {
        0
    }

    fn n_ranks(&self) -> usize {
        1
    }

    fn insert_exchange(
        &self,
        _publish: &HashMap<u64, ExchangeValue>,
        want: &[u64],
    ) -> CgResult<HashMap<u64, ExchangeValue>> {
        // 串行世界没有幽灵
        if want.is_empty() {
            Ok(HashMap::new())
        } else {
            Err(CgError::collective(
                0,
                "serial world has no ghost dofs to exchange",
            ))
        }
    }

    fn bail(&self, message: String) -> CgError {
        CgError::collective(0, message)
    }
}

// ============================================================================
// 进程内多分区世界
// ============================================================================

struct WorldState {
    epoch: u64,
    arrived: usize,
    staging: HashMap<u64, ExchangeValue>,
    published: HashMap<u64, ExchangeValue>,
    poisoned: Option<(usize, String)>,
}

struct WorldShared {
    n_ranks: usize,
    state: Mutex<WorldState>,
    cvar: Condvar,
}

/// 进程内 SPMD 世界
///
/// 每个 rank 在自己的线程上运行同一闭包；集合操作经由共享状态 +
/// 条件变量实现阻塞语义。
pub struct LocalWorld;

impl LocalWorld {
    /// 以 `n_ranks` 个分区运行 SPMD 闭包
    ///
    /// 闭包返回 `Err` 的分区会先毒化全域再退出，保证其余分区不会
    /// 在集合点死锁。返回按 rank 排列的各分区结果。
    pub fn run<T, F>(n_ranks: usize, f: F) -> Vec<CgResult<T>>
    where
        T: Send,
        F: Fn(RankComm) -> CgResult<T> + Sync,
    {
        assert!(n_ranks >= 1, "world needs at least one rank");

        let shared = Arc::new(WorldShared {
            n_ranks,
            state: Mutex::new(WorldState {
                epoch: 0,
                arrived: 0,
                staging: HashMap::new(),
                published: HashMap::new(),
                poisoned: None,
            }),
            cvar: Condvar::new(),
        });

        std::thread::scope(|scope| {
            let mut handles = Vec::with_capacity(n_ranks);
            for rank in 0..n_ranks {
                let comm = RankComm {
                    shared: Arc::clone(&shared),
                    rank,
                };
                let f = &f;
                handles.push(scope.spawn(move || {
                    let result = f(comm.clone());
                    if let Err(ref e) = result {
                        // 闭包可能没有经过 bail 就出错；补毒化防止死锁
                        comm.bail(e.to_string());
                    }
                    result
                }));
            }
            handles
                .into_iter()
                .map(|h| match h.join() {
                    Ok(r) => r,
                    Err(_) => Err(CgError::collective(usize::MAX, "rank thread panicked")),
                })
                .collect()
        })
    }
}

/// 单个 rank 的通信端点
pub struct RankComm {
    shared: Arc<WorldShared>,
    rank: usize,
}

impl Clone for RankComm {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            rank: self.rank,
        }
    }
}

impl Communicator for RankComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn n_ranks(&self) -> usize {
        self.shared.n_ranks
    }

    fn insert_exchange(
        &self,
        publish: &HashMap<u64, ExchangeValue>,
        want: &[u64],
    ) -> CgResult<HashMap<u64, ExchangeValue>> {
        let mut st = self.shared.state.lock();
        if let Some((rank, message)) = &st.poisoned {
            return Err(CgError::collective(*rank, message.clone()));
        }

        for (&g, &v) in publish {
            st.staging.insert(g, v);
        }
        st.arrived += 1;
        let my_epoch = st.epoch;

        if st.arrived == self.shared.n_ranks {
            st.published = std::mem::take(&mut st.staging);
            st.arrived = 0;
            st.epoch += 1;
            self.shared.cvar.notify_all();
        } else {
            while st.epoch == my_epoch && st.poisoned.is_none() {
                self.shared.cvar.wait(&mut st);
            }
            if let Some((rank, message)) = &st.poisoned {
                return Err(CgError::collective(*rank, message.clone()));
            }
        }

        let mut out = HashMap::with_capacity(want.len());
        for &g in want {
            if let Some(&v) = st.published.get(&g) {
                out.insert(g, v);
            }
        }
        Ok(out)
    }

    fn bail(&self, message: String) -> CgError {
        let mut st = self.shared.state.lock();
        if st.poisoned.is_none() {
            st.poisoned = Some((self.rank, message.clone()));
        }
        self.shared.cvar.notify_all();
        CgError::collective(self.rank, message)
    }
}

// ============================================================================
// 测试
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_comm_noop() {
        let comm = SerialComm;
        assert_eq!(comm.rank(), 0);
        assert_eq!(comm.n_ranks(), 1);
        let out = comm.insert_exchange(&HashMap::new(), &[]).unwrap();
        assert!(out.is_empty());
        assert!(comm.barrier().is_ok());
    }

    #[test]
    fn test_exchange_owner_to_ghost() {
        // rank 0 拥有全局自由度 7，rank 1 持有其幽灵副本
        let results = LocalWorld::run(2, |comm| {
            if comm.rank() == 0 {
                let mut publish = HashMap::new();
                publish.insert(7u64, [1.5, 2.5, 3.5]);
                comm.insert_exchange(&publish, &[])?;
                Ok(None)
            } else {
                let got = comm.insert_exchange(&HashMap::new(), &[7])?;
                Ok(got.get(&7).copied())
            }
        });

        assert!(results[0].is_ok());
        let ghost = results[1].as_ref().unwrap().unwrap();
        assert_eq!(ghost, [1.5, 2.5, 3.5]);
    }

    #[test]
    fn test_multiple_collectives_in_sequence() {
        let results = LocalWorld::run(3, |comm| {
            let mut seen = Vec::new();
            for round in 0..4u64 {
                let mut publish = HashMap::new();
                if comm.rank() == 0 {
                    publish.insert(round, [round as f64, 0.0, 0.0]);
                }
                let got = comm.insert_exchange(&publish, &[round])?;
                seen.push(got[&round][0]);
            }
            Ok(seen)
        });

        for r in results {
            assert_eq!(r.unwrap(), vec![0.0, 1.0, 2.0, 3.0]);
        }
    }

    #[test]
    fn test_failure_poisons_all_ranks() {
        let results = LocalWorld::run(2, |comm| {
            if comm.rank() == 0 {
                Err(comm.bail("solver blew up".into()))
            } else {
                // rank 1 会在集合点观察到 rank 0 的失败而不是死锁
                comm.insert_exchange(&HashMap::new(), &[])?;
                Ok(())
            }
        });

        for r in &results {
            let err = r.as_ref().unwrap_err();
            assert!(matches!(err, CgError::Collective { rank: 0, .. }));
        }
    }

    #[test]
    fn test_error_without_bail_still_poisons() {
        // 闭包直接返回 Err（没有显式 bail）；LocalWorld 补毒化
        let results = LocalWorld::run(2, |comm| {
            if comm.rank() == 1 {
                Err(CgError::solver("diverged"))
            } else {
                comm.barrier()?;
                Ok(())
            }
        });

        assert!(results[0].is_err());
        assert!(matches!(
            results[1].as_ref().unwrap_err(),
            CgError::Solver { .. }
        ));
    }
}
