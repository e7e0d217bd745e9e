// ============================================================
// Layer 5 — Adaptive Pooling
// ============================================================
// Pools a [batch, channels, H, W] feature map to a fixed
// [batch, channels, out_h, out_w] grid regardless of H and W.
//
// Output cell (i, j) covers input rows
//   floor(i * H / out_h) .. ceil((i + 1) * H / out_h)
// and the analogous columns, so cells may overlap when the
// output grid is larger than the input.

use burn::{prelude::*, tensor::module::adaptive_avg_pool2d};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum PoolingKind {
    AdaptiveMax,
    AdaptiveAvg,
}

impl Default for PoolingKind {
    fn default() -> Self {
        PoolingKind::AdaptiveMax
    }
}

impl PoolingKind {
    pub fn forward<B: Backend>(&self, x: Tensor<B, 4>, output: [usize; 2]) -> Tensor<B, 4> {
        match self {
            PoolingKind::AdaptiveMax => adaptive_max_pool2d(x, output),
            PoolingKind::AdaptiveAvg => adaptive_avg_pool2d(x, output),
        }
    }
}

fn bin(index: usize, input: usize, output: usize) -> (usize, usize) {
    let start = (index * input) / output;
    let end   = ((index + 1) * input).div_ceil(output);
    (start, end)
}

pub fn adaptive_max_pool2d<B: Backend>(x: Tensor<B, 4>, output: [usize; 2]) -> Tensor<B, 4> {
    let [n, c, h, w] = x.dims();
    let [out_h, out_w] = output;

    let mut cells = Vec::with_capacity(out_h * out_w);
    for i in 0..out_h {
        let (h0, h1) = bin(i, h, out_h);
        for j in 0..out_w {
            let (w0, w1) = bin(j, w, out_w);
            let cell = x
                .clone()
                .slice([0..n, 0..c, h0..h1, w0..w1])
                .reshape([n, c, (h1 - h0) * (w1 - w0)])
                .max_dim(2);
            cells.push(cell);
        }
    }
    Tensor::cat(cells, 2).reshape([n, c, out_h, out_w])
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TB = NdArray;

    #[test]
    fn test_bins_cover_input() {
        assert_eq!(bin(0, 11, 20), (0, 1));
        assert_eq!(bin(19, 11, 20), (10, 11));
        assert_eq!(bin(1, 4, 2), (2, 4));
    }

    #[test]
    fn test_max_pool_picks_window_maximum() {
        let device: <TB as Backend>::Device = Default::default();
        let data: Vec<f32> = (0..16).map(|v| v as f32).collect();
        let x = Tensor::<TB, 1>::from_floats(data.as_slice(), &device).reshape([1, 1, 4, 4]);
        let y = adaptive_max_pool2d(x, [2, 2]);
        assert_eq!(y.dims(), [1, 1, 2, 2]);
        assert_eq!(y.into_data().to_vec::<f32>().unwrap(), vec![5.0, 7.0, 13.0, 15.0]);
    }

    #[test]
    fn test_upsampling_grid() {
        let device: <TB as Backend>::Device = Default::default();
        let x = Tensor::<TB, 4>::ones([2, 3, 3, 3], &device);
        for kind in [PoolingKind::AdaptiveMax, PoolingKind::AdaptiveAvg] {
            assert_eq!(kind.forward(x.clone(), [5, 4]).dims(), [2, 3, 5, 4]);
        }
    }
}
