/// A `ParamGen` generates values for the initial state of the model's parameters.
pub trait ParamGen {
    /// Overwrites every value of `params` with a freshly generated one.
    ///
    /// # Arguments
    /// * `params` - The parameter slice to initialize.
    fn fill(&mut self, params: &mut [f32]);
}
