use std::time::Duration;

/// Retries allowed per task before it is dead-lettered.
pub const MAX_RETRIES: u32 = 3;
/// Base of the exponential backoff schedule.
pub const RETRY_BASE_DELAY: Duration = Duration::from_secs(5);

/// How a processing failure should be routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Retrying can never succeed: missing item, malformed payload, missing
    /// result record.
    Permanent,
    /// Worth another attempt after a delay: model or infrastructure down.
    Transient,
}

/// Routing decision for a failed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAction {
    /// Republish to the delayed-retry channel with the attempt counter
    /// bumped, hidden for `delay`.
    Retry { delay: Duration },
    /// Route to the dead-letter topic and fail the result record.
    DeadLetter,
}

/// Pure decision function: permanent failures dead-letter immediately;
/// transient failures back off exponentially (10s, 20s, 40s for the first,
/// second and third requeue) until `MAX_RETRIES` is exhausted.
pub fn decide(kind: FailureKind, retry_count: u32) -> RouteAction {
    match kind {
        FailureKind::Permanent => RouteAction::DeadLetter,
        FailureKind::Transient if retry_count < MAX_RETRIES => RouteAction::Retry {
            delay: RETRY_BASE_DELAY * 2u32.pow(retry_count + 1),
        },
        FailureKind::Transient => RouteAction::DeadLetter,
    }
}
