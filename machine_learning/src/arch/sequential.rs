use ndarray::{Array2, ArrayView2};

use super::{layers::Layer, loss::LossFn};
use crate::{MlErr, Result, optimization::Optimizer, spec::ModelSpec};

/// A sequential model: information flows forward when computing an output and backward when
/// computing the *deltas* of its layers.
///
/// The parameters of every layer live in a single flat buffer, in layer order, next to a
/// gradient buffer of the same length.
#[derive(Clone, Debug)]
pub struct Sequential {
    layers: Vec<Layer>,
    params: Vec<f32>,
    grad: Vec<f32>,
}

impl Sequential {
    /// Creates a new `Sequential`.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of.
    /// * `params` - The flat parameter buffer for all of the layers.
    ///
    /// # Returns
    /// A new `Sequential` instance or an error if `params` does not fit the layers.
    pub fn new<I>(layers: I, params: Vec<f32>) -> Result<Self>
    where
        I: IntoIterator<Item = Layer>,
    {
        let layers: Vec<Layer> = layers.into_iter().collect();

        if layers.is_empty() {
            return Err(MlErr::InvalidSpec(
                "model must have at least one layer".into(),
            ));
        }

        let size = layers.iter().map(Layer::size).sum();
        if params.len() != size {
            return Err(MlErr::SizeMismatch {
                what: "model parameters",
                got: params.len(),
                expected: size,
            });
        }

        Ok(Self {
            grad: vec![0.; size],
            layers,
            params,
        })
    }

    /// Returns the amount of parameters in the model.
    pub fn size(&self) -> usize {
        self.params.len()
    }

    pub fn params(&self) -> &[f32] {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut [f32] {
        &mut self.params
    }

    /// The gradient computed by the last `compute_grad` call.
    pub fn grad(&self) -> &[f32] {
        &self.grad
    }

    pub fn input_size(&self) -> usize {
        self.layers.first().map_or(0, Layer::input_size)
    }

    pub fn output_size(&self) -> usize {
        self.layers.last().map_or(0, Layer::output_size)
    }

    /// Returns the specification this model can be rebuilt from.
    pub fn spec(&self) -> ModelSpec {
        ModelSpec::Sequential {
            layers: self.layers.iter().map(Layer::spec).collect(),
        }
    }

    /// Makes a forward pass through the network, keeping what the backward pass needs.
    ///
    /// # Arguments
    /// * `x` - The input data, one sample per row.
    ///
    /// # Returns
    /// The prediction for the given input or an error if occurred.
    pub fn forward(&mut self, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let mut offset = 0;
        let mut a = x.to_owned();

        for layer in self.layers.iter_mut() {
            let size = layer.size();
            a = layer.forward(&self.params[offset..offset + size], a.view())?;
            offset += size;
        }

        Ok(a)
    }

    /// Makes a forward pass through the network without keeping any metadata, so a shared model
    /// can be used for inference.
    pub fn predict(&self, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let mut offset = 0;
        let mut a = x.to_owned();

        for layer in self.layers.iter() {
            let size = layer.size();
            a = layer.predict(&self.params[offset..offset + size], a.view())?;
            offset += size;
        }

        Ok(a)
    }

    /// Computes the gradient of the loss with respect to every parameter for a single batch,
    /// leaving it in the gradient buffer.
    ///
    /// # Returns
    /// The loss of the batch.
    pub fn compute_grad<L>(&mut self, loss_fn: &L, x: ArrayView2<f32>, y: ArrayView2<f32>) -> Result<f32>
    where
        L: LossFn + ?Sized,
    {
        let y_pred = self.forward(x)?;

        if y_pred.dim() != y.dim() {
            return Err(MlErr::SizeMismatch {
                what: "model output",
                got: y_pred.ncols(),
                expected: y.ncols(),
            });
        }

        let loss = loss_fn.loss(y_pred.view(), y);
        let mut d = loss_fn.loss_prime(y_pred.view(), y);
        let mut end = self.params.len();

        for layer in self.layers.iter_mut().rev() {
            let start = end - layer.size();
            d = layer.backward(&self.params[start..end], &mut self.grad[start..end], d)?;
            end = start;
        }

        Ok(loss)
    }

    /// Runs one optimization step per batch.
    ///
    /// # Arguments
    /// * `optimizer` - The optimizer that dictates how to update the weights on each gradient calculation.
    /// * `loss_fn` - The loss function.
    /// * `batches` - The batches of data.
    ///
    /// # Returns
    /// The epoch loss.
    // NOTE: since getting the actual loss would require forwarding over all batches again at
    // the end of the backprop iterations, we are approximating it by averaging the loss at
    // each batch.
    pub fn backprop<'a, O, L, I>(&mut self, optimizer: &mut O, loss_fn: &L, batches: I) -> Result<f32>
    where
        O: Optimizer + ?Sized,
        L: LossFn + ?Sized,
        I: Iterator<Item = (ArrayView2<'a, f32>, ArrayView2<'a, f32>)>,
    {
        let mut total_loss = 0.0;
        let mut num_batches = 0;

        for (x, y) in batches {
            total_loss += self.compute_grad(loss_fn, x, y)?;
            num_batches += 1;

            optimizer.update_params(&mut self.params, &self.grad);
        }

        if num_batches == 0 {
            return Err(MlErr::InvalidInput("there are no batches to train on"));
        }

        Ok(total_loss / num_batches as f32)
    }
}
