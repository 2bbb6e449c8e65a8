// crates/cg_solver/src/csr.rs

//! CSR 稀疏矩阵
//!
//! 组装用三元组构建器 + 只读 CSR 存储。重复条目在 `build` 时求和。

use cg_foundation::{CgError, CgResult};

/// CSR 稀疏矩阵
#[derive(Debug, Clone)]
pub struct CsrMatrix {
    n_rows: usize,
    n_cols: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<u32>,
    values: Vec<f64>,
}

impl CsrMatrix {
    /// 行数
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// 列数
    #[inline]
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// 非零元数量
    #[inline]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// 行的 (列, 值) 对
    pub fn row(&self, i: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let range = self.row_ptr[i]..self.row_ptr[i + 1];
        self.col_idx[range.clone()]
            .iter()
            .map(|&c| c as usize)
            .zip(self.values[range].iter().copied())
    }

    /// 对角元（缺失时为 0）
    pub fn diagonal(&self, i: usize) -> f64 {
        self.row(i)
            .find(|&(j, _)| j == i)
            .map(|(_, v)| v)
            .unwrap_or(0.0)
    }

    /// y = A x
    pub fn spmv(&self, x: &[f64], y: &mut [f64]) {
        debug_assert_eq!(x.len(), self.n_cols);
        debug_assert_eq!(y.len(), self.n_rows);
        for i in 0..self.n_rows {
            let mut acc = 0.0;
            for k in self.row_ptr[i]..self.row_ptr[i + 1] {
                acc += self.values[k] * x[self.col_idx[k] as usize];
            }
            y[i] = acc;
        }
    }

    /// 就地修改：把 `rows` 中各行替换为单位行，并对称地清除其所在列。
    ///
    /// Dirichlet 消元的后半步；右端项的修正由调用方在清除前完成。
    pub fn zero_rows_and_columns(&mut self, rows: &[bool]) {
        for i in 0..self.n_rows {
            for k in self.row_ptr[i]..self.row_ptr[i + 1] {
                let j = self.col_idx[k] as usize;
                if rows[i] || rows[j] {
                    self.values[k] = if i == j { 1.0 } else { 0.0 };
                }
            }
        }
    }
}

/// 三元组构建器
#[derive(Debug)]
pub struct CsrBuilder {
    n_rows: usize,
    n_cols: usize,
    triplets: Vec<(u32, u32, f64)>,
}

impl CsrBuilder {
    /// 创建构建器
    pub fn new(n_rows: usize, n_cols: usize) -> Self {
        Self {
            n_rows,
            n_cols,
            triplets: Vec::new(),
        }
    }

    /// 添加条目（重复条目求和）
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        debug_assert!(row < self.n_rows && col < self.n_cols);
        self.triplets.push((row as u32, col as u32, value));
    }

    /// 构建 CSR（每行内列升序，重复求和）
    pub fn build(mut self) -> CgResult<CsrMatrix> {
        for &(r, c, _) in &self.triplets {
            if r as usize >= self.n_rows || c as usize >= self.n_cols {
                return Err(CgError::index_out_of_bounds(
                    "matrix entry",
                    r.max(c) as usize,
                    self.n_rows.max(self.n_cols),
                ));
            }
        }
        self.triplets.sort_unstable_by_key(|&(r, c, _)| (r, c));

        let mut row_ptr = Vec::with_capacity(self.n_rows + 1);
        let mut col_idx = Vec::new();
        let mut values = Vec::new();
        row_ptr.push(0);

        let mut current_row = 0usize;
        let mut last: Option<(u32, u32)> = None;
        for (r, c, v) in self.triplets {
            // 同行同列 → 累加
            if last == Some((r, c)) {
                let k = values.len() - 1;
                values[k] += v;
                continue;
            }
            while current_row < r as usize {
                row_ptr.push(col_idx.len());
                current_row += 1;
            }
            col_idx.push(c);
            values.push(v);
            last = Some((r, c));
        }
        while current_row < self.n_rows {
            row_ptr.push(col_idx.len());
            current_row += 1;
        }

        Ok(CsrMatrix {
            n_rows: self.n_rows,
            n_cols: self.n_cols,
            row_ptr,
            col_idx,
            values,
        })
    }
}

// ============================================================================
// 测试
// ============================================================================
