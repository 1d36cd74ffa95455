//! Defines a _trigger_, the input that starts a run. The trigger is
//! built from the queue event that invoked the function; its
//! messages are counted but never read.

use aws_lambda_events::event::sqs::SqsEvent;
use lambda_runtime::LambdaEvent;

/// What started a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// A queue event delivered to the function.
    Event {
        request_id: String,
        messages: usize,
    },
    /// A run started by hand.
    Manual,
}

impl Trigger {
    /// Builds a trigger from a queue event.
    pub fn from_event(event: &LambdaEvent<SqsEvent>) -> Self {
        Trigger::Event {
            request_id: event.context.request_id.clone(),
            messages: event.payload.records.len(),
        }
    }
}
