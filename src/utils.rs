use std::ops::Range;

use burn::tensor::{backend::Backend, Tensor};

/// Splits `x` along `dim` into consecutive pieces of the given sizes.
pub fn split<B: Backend, const D: usize>(
    x: Tensor<B, D>,
    sizes: &[usize],
    dim: usize,
) -> Vec<Tensor<B, D>> {
    debug_assert_eq!(sizes.iter().sum::<usize>(), x.dims()[dim]);

    let mut current_idx: usize = 0;
    sizes
        .iter()
        .map(|&s| {
            let mut ranges = x.dims().map(|x| 0..x);
            ranges[dim] = current_idx..current_idx + s;
            current_idx += s;
            x.clone().slice(ranges)
        })
        .collect()
}

/// Splits the last axis into one single-column tensor per feature.
pub fn split_columns<B: Backend, const D: usize>(x: Tensor<B, D>) -> Vec<Tensor<B, D>> {
    let width = x.dims()[D - 1];
    split(x, &vec![1; width], D - 1)
}

/// Concatenates the tensors that are present, `None` when none are.
pub fn cat_present<B: Backend, const D: usize>(
    tensors: Vec<Option<Tensor<B, D>>>,
    dim: usize,
) -> Option<Tensor<B, D>> {
    let present: Vec<Tensor<B, D>> = tensors.into_iter().flatten().collect();

    match present.len() {
        0 => None,
        1 => present.into_iter().next(),
        _ => Some(Tensor::cat(present, dim)),
    }
}

/// Broadcasts a `[batch, d]` context over `steps` time steps.
pub fn expand_time<B: Backend>(context: Tensor<B, 2>, steps: usize) -> Tensor<B, 3> {
    let context: Tensor<B, 3> = context.unsqueeze_dim(1);
    context.repeat(1, steps)
}

/// `x[:, range, :]`
pub fn slice_time<B: Backend>(x: Tensor<B, 3>, range: Range<usize>) -> Tensor<B, 3> {
    let [batch, _, features] = x.dims();
    x.slice([0..batch, range, 0..features])
}

/// `x[:, :, range]`
pub fn slice_features<B: Backend>(x: Tensor<B, 3>, range: Range<usize>) -> Tensor<B, 3> {
    let [batch, steps, _] = x.dims();
    x.slice([0..batch, 0..steps, range])
}
