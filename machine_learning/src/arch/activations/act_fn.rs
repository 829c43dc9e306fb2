use super::{Relu, Tanh};
use crate::spec::ActFnSpec;

#[derive(Clone, Debug)]
pub enum ActFn {
    Relu(Relu),
    Tanh(Tanh),
}

impl ActFn {
    pub fn relu() -> Self {
        Self::Relu(Relu::new())
    }

    pub fn tanh() -> Self {
        Self::Tanh(Tanh::new())
    }

    pub fn f(&self, x: f32) -> f32 {
        match self {
            Self::Relu(a) => a.f(x),
            Self::Tanh(a) => a.f(x),
        }
    }

    pub fn df(&self, x: f32) -> f32 {
        match self {
            Self::Relu(a) => a.df(x),
            Self::Tanh(a) => a.df(x),
        }
    }

    /// Returns the specification this activation can be rebuilt from.
    pub fn spec(&self) -> ActFnSpec {
        match self {
            Self::Relu(_) => ActFnSpec::Relu,
            Self::Tanh(_) => ActFnSpec::Tanh,
        }
    }
}

impl From<ActFnSpec> for ActFn {
    fn from(spec: ActFnSpec) -> Self {
        match spec {
            ActFnSpec::Relu => ActFn::relu(),
            ActFnSpec::Tanh => ActFn::tanh(),
        }
    }
}
