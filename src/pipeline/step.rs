use super::StepError;

/// One unit of work in a pipeline.
///
/// Steps may be re-run for the same message: a pipeline that fails part-way
/// is retried from its first step, so every step must tolerate at-least-once
/// execution.
pub trait PipelineStep<M: ?Sized>: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &'static str {
        short_type_name(std::any::type_name::<Self>())
    }

    fn execute(&self, message: &M) -> Result<(), StepError>;
}

impl<M: ?Sized, S: PipelineStep<M> + ?Sized> PipelineStep<M> for Box<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn execute(&self, message: &M) -> Result<(), StepError> {
        (**self).execute(message)
    }
}

/// `my_crate::steps::Validate<T>` -> `Validate<T>`.
fn short_type_name(full: &'static str) -> &'static str {
    let path = full.split('<').next().unwrap_or(full);
    match path.rfind("::") {
        Some(i) => &full[i + 2..],
        None => full,
    }
}
