//! Simulated online requests gated by a shared tracker.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use optrack_tracker::OperationTracker;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// How the simulation issues requests.
#[derive(Debug, Clone)]
pub struct SimulationOptions {
    /// Number of requests to issue
    pub requests: usize,
    /// Time each request stays in flight
    pub delay: Duration,
    /// Launch all requests at once
    pub concurrent: bool,
}

/// What happened during a simulation.
#[derive(Debug, Clone, Default)]
pub struct SimulationReport {
    /// Requests that ran to completion
    pub completed: usize,
    /// Requests turned away because another was in flight
    pub rejected: usize,
    /// Every value the in-progress flag changed to, in order
    pub transitions: Vec<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Completed,
    Rejected,
}

/// Run the simulation against `tracker`.
pub async fn run(
    tracker: OperationTracker,
    options: SimulationOptions,
) -> Result<SimulationReport> {
    let transitions = Arc::new(std::sync::Mutex::new(Vec::new()));
    let in_progress = tracker.observe_in_progress();

    // Stands in for the UI: records transitions and toggles interactivity.
    let sink = Arc::clone(&transitions);
    let label = tracker.config().label.clone();
    let subscription = in_progress.subscribe(move |change| {
        if change.new {
            info!(label = %label, "Interaction disabled");
        } else {
            info!(label = %label, "Interaction enabled");
        }
        if let Ok(mut seen) = sink.lock() {
            seen.push(change.new);
        }
    });

    // Transitions need exclusive access; the tracker does no locking itself.
    let tracker = Arc::new(Mutex::new(tracker));

    let outcomes = if options.concurrent {
        let handles: Vec<_> = (0..options.requests)
            .map(|index| tokio::spawn(request(Arc::clone(&tracker), index, options.delay)))
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for handle in handles {
            outcomes.push(handle.await?);
        }
        outcomes
    } else {
        let mut outcomes = Vec::with_capacity(options.requests);
        for index in 0..options.requests {
            outcomes.push(request(Arc::clone(&tracker), index, options.delay).await);
        }
        outcomes
    };

    in_progress.unsubscribe(subscription);

    let transitions = transitions
        .lock()
        .map(|seen| seen.clone())
        .unwrap_or_default();

    Ok(SimulationReport {
        completed: outcomes.iter().filter(|o| **o == Outcome::Completed).count(),
        rejected: outcomes.iter().filter(|o| **o == Outcome::Rejected).count(),
        transitions,
    })
}

async fn request(
    tracker: Arc<Mutex<OperationTracker>>,
    index: usize,
    delay: Duration,
) -> Outcome {
    let begun = tracker.lock().await.begin_operation();
    match begun {
        Ok(id) => {
            debug!(request = index, operation = %id, "Request dispatched");
            tokio::time::sleep(delay).await;
            tracker.lock().await.end_operation();
            debug!(request = index, operation = %id, "Response received");
            Outcome::Completed
        }
        Err(err) => {
            info!(request = index, error = %err, "Request rejected");
            Outcome::Rejected
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(requests: usize, concurrent: bool) -> SimulationOptions {
        SimulationOptions {
            requests,
            delay: Duration::from_millis(50),
            concurrent,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_requests_all_complete() {
        let report = run(OperationTracker::new(), options(3, false)).await.unwrap();

        assert_eq!(report.completed, 3);
        assert_eq!(report.rejected, 0);
        assert_eq!(report.transitions, vec![true, false, true, false, true, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_requests_are_gated() {
        let report = run(OperationTracker::new(), options(4, true)).await.unwrap();

        assert_eq!(report.completed, 1);
        assert_eq!(report.rejected, 3);
        assert_eq!(report.transitions, vec![true, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_requests_no_transitions() {
        let report = run(OperationTracker::new(), options(0, true)).await.unwrap();

        assert_eq!(report.completed, 0);
        assert_eq!(report.rejected, 0);
        assert!(report.transitions.is_empty());
    }
}
