use ndarray::{Array2, ArrayView1, ArrayView2, ArrayViewMut1, ArrayViewMut2, Axis};
use rand::Rng;

use crate::{
    MlErr, Result, arch::activations::ActFn, initialization::RandWeightGen, spec::LayerSpec,
};

/// A fully connected layer. Its parameters are laid out as the row-major `(n, m)` weight matrix
/// followed by the `m` biases.
#[derive(Clone, Debug)]
pub struct Dense {
    dim: (usize, usize),
    act_fn: Option<ActFn>,
    size: usize,

    // Forward metadata
    x: Array2<f32>,
    z: Array2<f32>,
}

impl Dense {
    /// Creates a new `Dense` layer.
    ///
    /// # Arguments
    /// * `dim` - The input and output widths.
    /// * `act_fn` - An optional activation applied to the weighted sums.
    pub fn new(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        let zeros = Array2::zeros((0, 0));

        Self {
            dim,
            size: (dim.0 + 1) * dim.1,
            act_fn,
            x: zeros.clone(),
            z: zeros,
        }
    }

    /// Returns the size of this layer.
    ///
    /// # Returns
    /// The amount of parameters this layer has.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn dim(&self) -> (usize, usize) {
        self.dim
    }

    pub fn spec(&self) -> LayerSpec {
        LayerSpec::Dense {
            dim: self.dim,
            act_fn: self.act_fn.as_ref().map(ActFn::spec),
        }
    }

    /// Generates the initial parameters: Xavier uniform weights and zero biases.
    pub fn init_params<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Vec<f32>> {
        let (n, m) = self.dim;
        let mut params = RandWeightGen::xavier_uniform(n, m)?.sample(rng, n * m);
        params.resize(self.size, 0.);
        Ok(params)
    }

    /// Computes the output of the layer and remembers what `backward` needs.
    pub fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let (z, a) = self.run(params, x)?;
        self.x = x.to_owned();
        self.z = z;
        Ok(a)
    }

    /// Computes the output of the layer without touching its metadata.
    pub fn predict(&self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let (_, a) = self.run(params, x)?;
        Ok(a)
    }

    /// Writes this layer's gradient into `grad` and returns the delta for the previous layer.
    ///
    /// # Arguments
    /// * `params` - This layer's parameters.
    /// * `grad` - This layer's slice of the gradient buffer.
    /// * `d` - The derivative of the loss with respect to this layer's output.
    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        mut d: Array2<f32>,
    ) -> Result<Array2<f32>> {
        if d.dim() != self.z.dim() {
            return Err(MlErr::SizeMismatch {
                what: "dense delta rows",
                got: d.nrows(),
                expected: self.z.nrows(),
            });
        }

        if let Some(act_fn) = &self.act_fn {
            d.zip_mut_with(&self.z, |d, &z| *d *= act_fn.df(z));
        }

        let (mut dw, mut db) = self.view_grad(grad)?;
        dw.assign(&self.x.t().dot(&d));
        db.assign(&d.sum_axis(Axis(0)));

        let (w, _) = self.view_params(params)?;
        Ok(d.dot(&w.t()))
    }

    fn run(&self, params: &[f32], x: ArrayView2<f32>) -> Result<(Array2<f32>, Array2<f32>)> {
        if x.ncols() != self.dim.0 {
            return Err(MlErr::SizeMismatch {
                what: "dense input",
                got: x.ncols(),
                expected: self.dim.0,
            });
        }

        let (w, b) = self.view_params(params)?;
        let z = x.dot(&w) + &b;

        let a = match &self.act_fn {
            Some(act_fn) => z.mapv(|z| act_fn.f(z)),
            None => z.clone(),
        };

        Ok((z, a))
    }

    /// Gives a view of the raw gradient slice as the delta weights and delta biases of this layer.
    ///
    /// # Arguments
    /// * `grad` - A gradient slice.
    ///
    /// # Returns
    /// A tuple containing the delta weights and delta biases.
    fn view_grad<'a>(
        &self,
        grad: &'a mut [f32],
    ) -> Result<(ArrayViewMut2<'a, f32>, ArrayViewMut1<'a, f32>)> {
        self.check_len("dense gradient", grad.len())?;

        let w_size = self.size - self.dim.1;
        let (dw_raw, db_raw) = grad.split_at_mut(w_size);
        let dw = ArrayViewMut2::from_shape(self.dim, dw_raw)?;
        let db = ArrayViewMut1::from_shape(self.dim.1, db_raw)?;
        Ok((dw, db))
    }

    /// Gives a view of the raw parameter slice as the weights and biases of this layer.
    ///
    /// # Arguments
    /// * `params` - A slice of parameters.
    ///
    /// # Returns
    /// A tuple containing the weights and biases.
    fn view_params<'a>(
        &self,
        params: &'a [f32],
    ) -> Result<(ArrayView2<'a, f32>, ArrayView1<'a, f32>)> {
        self.check_len("dense parameters", params.len())?;

        let w_size = self.size - self.dim.1;
        let weights = ArrayView2::from_shape(self.dim, &params[..w_size])?;
        let biases = ArrayView1::from_shape(self.dim.1, &params[w_size..])?;
        Ok((weights, biases))
    }

    fn check_len(&self, what: &'static str, got: usize) -> Result<()> {
        if got != self.size {
            return Err(MlErr::SizeMismatch {
                what,
                got,
                expected: self.size,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn forward_computes_the_weighted_sum() {
        let mut dense = Dense::new((2, 1), None);
        let params = [1.0, 2.0, 0.5];

        let y = dense.forward(&params, array![[1.0, 1.0], [2.0, 0.0]].view()).unwrap();
        assert_eq!(y, array![[3.5], [2.5]]);
    }

    #[test]
    fn relu_clips_the_output() {
        let dense = Dense::new((1, 2), Some(ActFn::relu()));
        let params = [1.0, -1.0, 0.0, 0.0];

        let y = dense.predict(&params, array![[2.0]].view()).unwrap();
        assert_eq!(y, array![[2.0, 0.0]]);
    }

    #[test]
    fn backward_writes_weight_and_bias_deltas() {
        let mut dense = Dense::new((2, 1), None);
        let params = [1.0, 2.0, 0.5];
        let mut grad = [0.0; 3];

        dense.forward(&params, array![[1.0, 3.0]].view()).unwrap();
        let d_prev = dense.backward(&params, &mut grad, array![[2.0]]).unwrap();

        assert_eq!(grad, [2.0, 6.0, 2.0]);
        assert_eq!(d_prev, array![[2.0, 4.0]]);
    }

    #[test]
    fn mismatched_inputs_are_rejected() {
        let dense = Dense::new((3, 1), None);
        let params = [0.0; 4];

        let err = dense.predict(&params, array![[1.0]].view()).unwrap_err();
        assert!(matches!(err, MlErr::SizeMismatch { expected: 3, .. }));
        assert!(dense.predict(&params[..2], array![[1.0, 2.0, 3.0]].view()).is_err());
    }
}
