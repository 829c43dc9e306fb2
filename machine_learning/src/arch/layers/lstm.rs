use ndarray::{
    Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut1, ArrayViewMut2, Axis, concatenate, s,
};
use rand::Rng;

use crate::{
    MlErr, Result,
    arch::activations::{Sigmoid, Tanh},
    initialization::RandWeightGen,
    spec::LayerSpec,
};

/// What a single time step keeps around for the backward pass.
#[derive(Clone, Debug)]
struct StepCache {
    x: Array2<f32>,
    h_prev: Array2<f32>,
    c_prev: Array2<f32>,
    i: Array2<f32>,
    f: Array2<f32>,
    g: Array2<f32>,
    o: Array2<f32>,
    c: Array2<f32>,
}

/// A long short-term memory layer.
///
/// Every input row holds `steps` consecutive vectors of `input` features. The output row is
/// either the hidden state of every step (`return_sequences`) or only the last one.
///
/// Parameters are laid out as the input kernel `(input, 4 * units)`, the recurrent kernel
/// `(units, 4 * units)` and the `4 * units` biases, each split in the input, forget, cell and
/// output gate blocks, in that order.
#[derive(Clone, Debug)]
pub struct Lstm {
    input: usize,
    units: usize,
    steps: usize,
    return_sequences: bool,
    size: usize,

    cache: Vec<StepCache>,
}

impl Lstm {
    /// Creates a new `Lstm` layer.
    ///
    /// # Arguments
    /// * `input` - The amount of features fed on each step.
    /// * `units` - The width of the hidden and cell states.
    /// * `steps` - The amount of time steps in each row.
    /// * `return_sequences` - Whether to output the hidden state of every step.
    pub fn new(input: usize, units: usize, steps: usize, return_sequences: bool) -> Self {
        Self {
            input,
            units,
            steps,
            return_sequences,
            size: (input + units + 1) * 4 * units,
            cache: Vec::new(),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn input_size(&self) -> usize {
        self.input * self.steps
    }

    pub fn output_size(&self) -> usize {
        if self.return_sequences {
            self.units * self.steps
        } else {
            self.units
        }
    }

    pub fn spec(&self) -> LayerSpec {
        LayerSpec::Lstm {
            input: self.input,
            units: self.units,
            steps: self.steps,
            return_sequences: self.return_sequences,
        }
    }

    /// Generates the initial parameters: Xavier uniform kernels, zero biases except for the
    /// forget gate, which starts at one so the cell remembers by default.
    pub fn init_params<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Vec<f32>> {
        let gates = 4 * self.units;

        let mut params = RandWeightGen::xavier_uniform(self.input, gates)?
            .sample(rng, self.input * gates);
        params.extend(RandWeightGen::xavier_uniform(self.units, gates)?.sample(rng, self.units * gates));

        let mut biases = vec![0.; gates];
        biases[self.units..2 * self.units].fill(1.);
        params.extend(biases);

        Ok(params)
    }

    pub fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let (out, cache) = self.run(params, x)?;
        self.cache = cache;
        Ok(out)
    }

    pub fn predict(&self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let (out, _) = self.run(params, x)?;
        Ok(out)
    }

    /// Backpropagates through time.
    ///
    /// # Arguments
    /// * `params` - This layer's parameters.
    /// * `grad` - This layer's slice of the gradient buffer.
    /// * `d` - The derivative of the loss with respect to this layer's output.
    ///
    /// # Returns
    /// The derivative of the loss with respect to this layer's input.
    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: Array2<f32>,
    ) -> Result<Array2<f32>> {
        if self.cache.len() != self.steps {
            return Err(MlErr::InvalidInput("lstm backward called before forward"));
        }

        if d.ncols() != self.output_size() {
            return Err(MlErr::SizeMismatch {
                what: "lstm delta",
                got: d.ncols(),
                expected: self.output_size(),
            });
        }

        let (w, u, _) = self.view_params(params)?;
        let (input, units, steps) = (self.input, self.units, self.steps);
        let batch = d.nrows();

        let mut dw = Array2::<f32>::zeros((input, 4 * units));
        let mut du = Array2::<f32>::zeros((units, 4 * units));
        let mut db = Array1::<f32>::zeros(4 * units);
        let mut dx = Array2::<f32>::zeros((batch, steps * input));

        let cell = Tanh::new();
        let mut dh_next = Array2::<f32>::zeros((batch, units));
        let mut dc_next = Array2::<f32>::zeros((batch, units));

        for t in (0..steps).rev() {
            let step = &self.cache[t];

            let mut dh = dh_next;
            if self.return_sequences {
                dh += &d.slice(s![.., t * units..(t + 1) * units]);
            } else if t == steps - 1 {
                dh += &d;
            }

            let tanh_c = step.c.mapv(|v| cell.f(v));
            let d_o = &dh * &tanh_c;
            let dc = &dc_next + &(&dh * &step.o * &tanh_c.mapv(|v| 1. - v * v));

            let d_i = &dc * &step.g;
            let d_f = &dc * &step.c_prev;
            let d_g = &dc * &step.i;
            dc_next = &dc * &step.f;

            let dz_i = d_i * &step.i.mapv(|v| v * (1. - v));
            let dz_f = d_f * &step.f.mapv(|v| v * (1. - v));
            let dz_g = d_g * &step.g.mapv(|v| 1. - v * v);
            let dz_o = d_o * &step.o.mapv(|v| v * (1. - v));
            let dz = concatenate(
                Axis(1),
                &[dz_i.view(), dz_f.view(), dz_g.view(), dz_o.view()],
            )?;

            dw += &step.x.t().dot(&dz);
            du += &step.h_prev.t().dot(&dz);
            db += &dz.sum_axis(Axis(0));

            dx.slice_mut(s![.., t * input..(t + 1) * input])
                .assign(&dz.dot(&w.t()));
            dh_next = dz.dot(&u.t());
        }

        let (mut gw, mut gu, mut gb) = self.view_grad(grad)?;
        gw.assign(&dw);
        gu.assign(&du);
        gb.assign(&db);

        Ok(dx)
    }

    fn run(&self, params: &[f32], x: ArrayView2<f32>) -> Result<(Array2<f32>, Vec<StepCache>)> {
        if x.ncols() != self.input_size() {
            return Err(MlErr::SizeMismatch {
                what: "lstm input",
                got: x.ncols(),
                expected: self.input_size(),
            });
        }

        let (w, u, b) = self.view_params(params)?;
        let (input, units) = (self.input, self.units);
        let batch = x.nrows();
        let gate = Sigmoid::new(1.);
        let cell = Tanh::new();

        let mut h = Array2::<f32>::zeros((batch, units));
        let mut c = Array2::<f32>::zeros((batch, units));
        let mut out = Array2::<f32>::zeros((batch, self.output_size()));
        let mut cache = Vec::with_capacity(self.steps);

        for t in 0..self.steps {
            let xt = x.slice(s![.., t * input..(t + 1) * input]);
            let z = xt.dot(&w) + h.dot(&u) + &b;

            let i = z.slice(s![.., 0..units]).mapv(|v| gate.f(v));
            let f = z.slice(s![.., units..2 * units]).mapv(|v| gate.f(v));
            let g = z.slice(s![.., 2 * units..3 * units]).mapv(|v| cell.f(v));
            let o = z.slice(s![.., 3 * units..4 * units]).mapv(|v| gate.f(v));

            let c_next = &f * &c + &i * &g;
            let h_next = &o * &c_next.mapv(|v| cell.f(v));

            if self.return_sequences {
                out.slice_mut(s![.., t * units..(t + 1) * units])
                    .assign(&h_next);
            }

            cache.push(StepCache {
                x: xt.to_owned(),
                h_prev: h,
                c_prev: c,
                i,
                f,
                g,
                o,
                c: c_next.clone(),
            });

            h = h_next;
            c = c_next;
        }

        if !self.return_sequences {
            out.assign(&h);
        }

        Ok((out, cache))
    }

    fn view_params<'a>(
        &self,
        params: &'a [f32],
    ) -> Result<(ArrayView2<'a, f32>, ArrayView2<'a, f32>, ArrayView1<'a, f32>)> {
        self.check_len("lstm parameters", params.len())?;

        let gates = 4 * self.units;
        let (w_raw, rest) = params.split_at(self.input * gates);
        let (u_raw, b_raw) = rest.split_at(self.units * gates);

        Ok((
            ArrayView2::from_shape((self.input, gates), w_raw)?,
            ArrayView2::from_shape((self.units, gates), u_raw)?,
            ArrayView1::from_shape(gates, b_raw)?,
        ))
    }

    fn view_grad<'a>(
        &self,
        grad: &'a mut [f32],
    ) -> Result<(
        ArrayViewMut2<'a, f32>,
        ArrayViewMut2<'a, f32>,
        ArrayViewMut1<'a, f32>,
    )> {
        self.check_len("lstm gradient", grad.len())?;

        let gates = 4 * self.units;
        let (w_raw, rest) = grad.split_at_mut(self.input * gates);
        let (u_raw, b_raw) = rest.split_at_mut(self.units * gates);

        Ok((
            ArrayViewMut2::from_shape((self.input, gates), w_raw)?,
            ArrayViewMut2::from_shape((self.units, gates), u_raw)?,
            ArrayViewMut1::from_shape(gates, b_raw)?,
        ))
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
