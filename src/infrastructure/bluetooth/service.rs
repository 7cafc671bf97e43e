//! Tracker Service Module
//!
//! The single logical thread of control. Owns the [`BatteryTracker`], runs
//! every transport request as its own task with a bounded wait, and feeds
//! completions, transport events and user intents back into the tracker one
//! at a time.

use crate::domain::commands::{Completion, TransportRequest};
use crate::domain::models::{TransportEvent, UserIntent};
use crate::domain::tracker::{BatteryTracker, TrackerConfig, ViewSnapshot};
use crate::error::TransportError;
use crate::infrastructure::bluetooth::transport::Transport;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Event loop coordinating the tracker and the transport
pub struct TrackerService<T: Transport> {
    transport: Arc<T>,
    tracker: BatteryTracker,
    request_timeout: Duration,
    completion_tx: mpsc::UnboundedSender<Completion>,
    completion_rx: mpsc::UnboundedReceiver<Completion>,
    view_tx: watch::Sender<ViewSnapshot>,
}

impl<T: Transport> TrackerService<T> {
    /// Create the service and the receiver the view reads snapshots from
    pub fn new(
        transport: Arc<T>,
        config: TrackerConfig,
        request_timeout: Duration,
    ) -> (Self, watch::Receiver<ViewSnapshot>) {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(ViewSnapshot::default());
        let service = Self {
            transport,
            tracker: BatteryTracker::new(config),
            request_timeout,
            completion_tx,
            completion_rx,
            view_tx,
        };
        (service, view_rx)
    }

    /// Run until [`UserIntent::Shutdown`] arrives or the intent channel
    /// closes, then unsubscribe and clear.
    pub async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<TransportEvent>,
        mut intents: mpsc::UnboundedReceiver<UserIntent>,
    ) {
        info!("Battery tracker started");
        let requests = self.tracker.start();
        self.dispatch(requests);
        self.publish();

        let mut events_open = true;
        loop {
            let requests = tokio::select! {
                Some(completion) = self.completion_rx.recv() => {
                    self.tracker.handle_completion(completion)
                }
                event = events.recv(), if events_open => match event {
                    Some(event) => self.tracker.handle_event(event),
                    None => {
                        warn!("Transport event stream closed");
                        events_open = false;
                        Vec::new()
                    }
                },
                intent = intents.recv() => match intent {
                    Some(UserIntent::Select(address)) => self.tracker.user_select(address),
                    Some(UserIntent::Shutdown) | None => break,
                },
            };
            self.dispatch(requests);
            self.publish();
        }

        self.shutdown().await;
    }

    async fn shutdown(&mut self) {
        // Wait for the unsubscribe here; nothing is left to receive it later.
        for request in self.tracker.shutdown() {
            let completion = execute(self.transport.as_ref(), request, self.request_timeout).await;
            self.tracker.handle_completion(completion);
        }
        self.publish();
        info!("Battery tracker stopped");
    }

    fn dispatch(&self, requests: Vec<TransportRequest>) {
        for request in requests {
            debug!("Dispatching {}", request.operation());
            let transport = Arc::clone(&self.transport);
            let sender = self.completion_tx.clone();
            let timeout = self.request_timeout;
            tokio::spawn(async move {
                let completion = execute(transport.as_ref(), request, timeout).await;
                let _ = sender.send(completion);
            });
        }
    }

    fn publish(&self) {
        let next = self.tracker.view();
        self.view_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}

async fn bounded<R>(
    operation: &'static str,
    limit: Duration,
    call: impl Future<Output = Result<R, TransportError>>,
) -> Result<R, TransportError> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout(operation, limit.as_millis() as u64)),
    }
}

async fn execute<T: Transport>(
    transport: &T,
    request: TransportRequest,
    limit: Duration,
) -> Completion {
    let operation = request.operation();
    match request {
        TransportRequest::GetAdapterState => {
            Completion::AdapterState(bounded(operation, limit, transport.adapter_state()).await)
        }
        TransportRequest::ListPeripherals => {
            Completion::Peripherals(bounded(operation, limit, transport.devices()).await)
        }
        TransportRequest::ListServices { address, purpose } => {
            let result = bounded(operation, limit, transport.services(&address)).await;
            Completion::Services {
                address,
                purpose,
                result,
            }
        }
        TransportRequest::GetPeripheral {
            address,
            service_uuid,
            generation,
        } => {
            let result = bounded(operation, limit, transport.device(&address)).await;
            Completion::Peripheral {
                address,
                service_uuid,
                generation,
                result,
            }
        }
        TransportRequest::GetCharacteristics { service, token } => {
            let result = bounded(operation, limit, transport.characteristics(&service)).await;
            Completion::Characteristics {
                service,
                token,
                result,
            }
        }
        TransportRequest::StartNotifications {
            characteristic,
            token,
        } => {
            let result = bounded(
                operation,
                limit,
                transport.start_notifications(&characteristic),
            )
            .await;
            Completion::NotificationsStarted {
                characteristic,
                token,
                result,
            }
        }
        TransportRequest::StopNotifications { characteristic } => {
            let result = bounded(
                operation,
                limit,
                transport.stop_notifications(&characteristic),
            )
            .await;
            Completion::NotificationsStopped {
                characteristic,
                result,
            }
        }
        TransportRequest::ReadValue {
            characteristic,
            token,
        } => {
            let result = bounded(
                operation,
                limit,
                transport.read_characteristic_value(&characteristic),
            )
            .await;
            Completion::ValueRead {
                characteristic,
                token,
                result,
            }
        }
    }
}
