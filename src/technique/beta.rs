/// MIS power-heuristic policy. The exponent is fixed per estimator at
/// construction and dispatched statically in the inner loops; beta = 1 is
/// the balance heuristic, beta = 0 counts strategies.
pub trait Beta: Copy + Send + Sync + 'static {
    fn beta(&self, x: f32) -> f32;
    fn suffix(&self) -> String;
}

#[derive(Debug, Copy, Clone, Default)]
pub struct FixedBeta<const N: i32>;

impl<const N: i32> Beta for FixedBeta<N> {
    #[inline(always)]
    fn beta(&self, x: f32) -> f32 {
        x.powi(N)
    }

    fn suffix(&self) -> String {
        N.to_string()
    }
}

#[derive(Debug, Copy, Clone)]
pub struct VariableBeta {
    pub value: f32,
}

impl VariableBeta {
    pub fn new(value: f32) -> Self {
        VariableBeta { value }
    }
}

impl Beta for VariableBeta {
    #[inline(always)]
    fn beta(&self, x: f32) -> f32 {
        x.powf(self.value)
    }

    fn suffix(&self) -> String {
        "b".to_string()
    }
}
