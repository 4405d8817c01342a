//! Convolutions lowered to matrix products
//!
//! The input is viewed by stride phase, `[N, C, H / s, s, W / s, s]`, so every
//! kernel offset of a strided convolution is a plain slice of that view. Both
//! directions then reduce to `matmul`, slicing, padding and reshapes, and so
//! do their gradients.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Crop or zero-extend the spatial sides of `[N, C, H, W]` at the bottom and right.
fn fit<B: Backend>(input: Tensor<B, 4>, height: usize, width: usize) -> Tensor<B, 4> {
    let [_, _, h, w] = input.dims();
    let input = input.narrow(2, 0, h.min(height)).narrow(3, 0, w.min(width));

    if height > h || width > w {
        input.pad((0, width.saturating_sub(w), 0, height.saturating_sub(h)), 0.0)
    } else {
        input
    }
}

/// Strided convolution of `[N, C, H, W]` with a `[O, C, k, k]` filter.
///
/// `padding` zeros are added on every side first. The output is
/// `[N, O, (H + 2p - k) / s + 1, (W + 2p - k) / s + 1]`; callers make sure
/// the kernel fits.
pub fn convolve<B: Backend>(
    input: Tensor<B, 4>,
    weight: Tensor<B, 4>,
    bias: Tensor<B, 1>,
    stride: usize,
    padding: usize,
) -> Tensor<B, 4> {
    let input = match padding {
        0 => input,
        p => input.pad((p, p, p, p), 0.0),
    };
    let [batch, channels, height, width] = input.dims();
    let [filters, _, kernel, _] = weight.dims();
    let out_h = (height - kernel) / stride + 1;
    let out_w = (width - kernel) / stride + 1;

    // Offset a sits at phase a % s of cell a / s.
    let reach = (kernel - 1) / stride;
    let (cells_h, cells_w) = (out_h + reach, out_w + reach);
    let phases = fit(input, cells_h * stride, cells_w * stride)
        .reshape([batch, channels, cells_h, stride, cells_w, stride]);

    let mut windows = Vec::with_capacity(kernel * kernel);
    for a in 0..kernel {
        for b in 0..kernel {
            let (qa, ra, qb, rb) = (a / stride, a % stride, b / stride, b % stride);
            let window = phases.clone().slice([
                0..batch,
                0..channels,
                qa..qa + out_h,
                ra..ra + 1,
                qb..qb + out_w,
                rb..rb + 1,
            ]);
            windows.push(window.reshape([batch, channels, out_h * out_w]));
        }
    }

    // Rows ordered (channel, a, b) like the flattened filter.
    let columns = Tensor::stack::<4>(windows, 2).reshape([
        batch,
        channels * kernel * kernel,
        out_h * out_w,
    ]);
    let filter = weight.reshape([1, filters, channels * kernel * kernel]);

    (filter.matmul(columns) + bias.reshape([1, filters, 1]))
        .reshape([batch, filters, out_h, out_w])
}

/// Transposed convolution of `[N, C, h, w]` with a `[C, O, k, k]` filter,
/// cropped or zero-extended at the bottom and right to `output`.
///
/// Without cropping the natural size is `(h - 1) * s + k`; rows and columns
/// past it hold only the bias.
pub fn convolve_transposed<B: Backend>(
    input: Tensor<B, 4>,
    weight: Tensor<B, 4>,
    bias: Tensor<B, 1>,
    stride: usize,
    output: [usize; 2],
) -> Tensor<B, 4> {
    let [batch, channels, height, width] = input.dims();
    let [_, filters, kernel, _] = weight.dims();
    let device = input.device();

    // One k x k block per input pixel and filter: [N, O, k*k, h, w]
    let filter = weight
        .reshape([channels, filters * kernel * kernel])
        .transpose()
        .unsqueeze::<3>();
    let blocks = filter
        .matmul(input.reshape([batch, channels, height * width]))
        .reshape([batch, filters, kernel * kernel, height, width]);

    let reach = (kernel - 1) / stride;
    let (cells_h, cells_w) = (height + reach, width + reach);

    let mut phases: Vec<Option<Tensor<B, 4>>> = vec![None; stride * stride];
    for a in 0..kernel {
        for b in 0..kernel {
            let (qa, ra, qb, rb) = (a / stride, a % stride, b / stride, b % stride);
            let offset = a * kernel + b;
            let block = blocks
                .clone()
                .slice([
                    0..batch,
                    0..filters,
                    offset..offset + 1,
                    0..height,
                    0..width,
                ])
                .reshape([batch, filters, height, width])
                .pad((qb, reach - qb, qa, reach - qa), 0.0);

            let slot = &mut phases[ra * stride + rb];
            *slot = Some(match slot.take() {
                Some(sum) => sum + block,
                None => block,
            });
        }
    }

    let phases: Vec<Tensor<B, 4>> = phases
        .into_iter()
        .map(|phase| {
            phase.unwrap_or_else(|| Tensor::zeros([batch, filters, cells_h, cells_w], &device))
        })
        .collect();

    // [N, O, s, s, H', W'] -> [N, O, H', s, W', s] -> [N, O, H' * s, W' * s]
    let interleaved = Tensor::stack::<5>(phases, 2)
        .reshape([batch, filters, stride, stride, cells_h, cells_w])
        .permute([0, 1, 4, 2, 5, 3])
        .reshape([batch, filters, cells_h * stride, cells_w * stride]);

    fit(interleaved, output[0], output[1]) + bias.reshape([1, filters, 1, 1])
}
