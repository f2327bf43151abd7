use tracing::{debug, trace};

use super::{PipelineError, PipelineStep};

/// An ordered sequence of steps run against one message at a time.
///
/// ```
/// use outbox_pipeline::{Pipeline, StepError, step_fn};
///
/// let pipeline = Pipeline::<String>::builder()
///     .step(step_fn("not-empty", |m: &String| {
///         if m.is_empty() { Err(StepError::new("empty")) } else { Ok(()) }
///     }))
///     .build();
///
/// assert!(pipeline.process(&"hello".to_string()).is_ok());
/// assert_eq!(pipeline.process(&String::new()).unwrap_err().reason(), "empty");
/// ```
pub struct Pipeline<M: ?Sized> {
    steps: Vec<Box<dyn PipelineStep<M>>>,
}

impl<M: ?Sized> Pipeline<M> {
    /// Start building a pipeline.
    pub fn builder() -> PipelineBuilder<M> {
        PipelineBuilder { steps: Vec::new() }
    }

    /// Build from already boxed steps, run in vector order.
    pub fn new(steps: Vec<Box<dyn PipelineStep<M>>>) -> Self {
        Pipeline { steps }
    }

    /// Run every step in order, stopping at the first failure.
    pub fn process(&self, message: &M) -> Result<(), PipelineError> {
        for (index, step) in self.steps.iter().enumerate() {
            trace!(step = step.name(), index, "Executing pipeline step");
            if let Err(source) = step.execute(message) {
                debug!(step = step.name(), index, error = %source, "Pipeline step failed");
                return Err(PipelineError {
                    step: step.name(),
                    index,
                    source,
                });
            }
        }
        Ok(())
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// An empty pipeline succeeds for every message.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Step names in execution order.
    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }
}

impl<M: ?Sized> Default for Pipeline<M> {
    fn default() -> Self {
        Pipeline { steps: Vec::new() }
    }
}

impl<M: ?Sized> std::fmt::Debug for Pipeline<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("steps", &self.step_names())
            .finish()
    }
}

/// Builds a [`Pipeline`] one step at a time; steps run in the order added.
pub struct PipelineBuilder<M: ?Sized> {
    steps: Vec<Box<dyn PipelineStep<M>>>,
}

impl<M: ?Sized> PipelineBuilder<M> {
    /// Append a step.
    pub fn step<S>(mut self, step: S) -> Self
    where
        S: PipelineStep<M> + 'static,
    {
        self.steps.push(Box::new(step));
        self
    }

    /// Append a step that is already boxed.
    pub fn boxed_step(mut self, step: Box<dyn PipelineStep<M>>) -> Self {
        self.steps.push(step);
        self
    }

    /// Finish the pipeline.
    pub fn build(self) -> Pipeline<M> {
        Pipeline { steps: self.steps }
    }
}
