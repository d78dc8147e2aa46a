//! Shared output channels fanned in from every root and debounce waiter

use async_channel::{Receiver, Sender};
use tracing::{debug, error, info, trace, warn};
use treewatch_core::{Event, Level, WatchError};

/// Sending halves of the event and error streams.
///
/// Both channels are bounded: a consumer that stops draining stalls the
/// producers instead of losing messages.
#[derive(Clone)]
pub(crate) struct Outputs {
    events: Sender<Event>,
    errors: Sender<WatchError>,
}

impl Outputs {
    pub(crate) fn new(capacity: usize) -> (Self, Receiver<Event>, Receiver<WatchError>) {
        let (events, events_rx) = async_channel::bounded(capacity);
        let (errors, errors_rx) = async_channel::bounded(capacity);
        (Self { events, errors }, events_rx, errors_rx)
    }

    /// Deliver an event; false once every receiver is gone
    pub(crate) async fn emit(&self, event: Event) -> bool {
        debug!(action = %event.action, path = %event.path.display(), "Emitting event");
        self.events.send(event).await.is_ok()
    }

    /// Log a report and put it on the error stream
    pub(crate) async fn report(&self, report: WatchError) {
        log_report(&report);
        if self.errors.send(report).await.is_err() {
            trace!("Error stream closed, report dropped");
        }
    }
}

fn log_report(report: &WatchError) {
    match report.level {
        Level::Critical => error!(level = %report.level, "{}", report.message),
        Level::Error => error!("{}", report.message),
        Level::Warning => warn!("{}", report.message),
        Level::Info => info!("{}", report.message),
        Level::Debug => debug!("{}", report.message),
        Level::Trace | Level::Unspecified => trace!("{}", report.message),
    }
}
