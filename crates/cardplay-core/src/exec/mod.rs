//! Executor: evaluates compiled plans over tick windows.

mod executor;
mod log;
mod queue;

pub use executor::{Budget, EvalError, Evaluation, Executor, ExecutorConfig, ExecutorSnapshot};
pub use log::{CardTiming, InvocationRecord, PortShape, summarize};
pub use queue::{CaptureConfig, CapturedEvent, EventQueue, OverflowPolicy, QueueFull};
