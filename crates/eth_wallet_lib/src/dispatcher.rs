use crate::db::model::TransactionStatus;
use serde_json::Value;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Fire-and-forget triggers for the downstream collaborators.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchEvent {
    Notify {
        address: String,
        message: String,
    },
    ProcessTransactions {
        address: String,
    },
    SetTransactionStatus {
        transaction_id: i64,
        status: TransactionStatus,
    },
    WildcardTokenRefresh {
        address: String,
    },
    Track {
        sender_id: Option<String>,
        event: String,
        data: Value,
    },
}

/// Sink for side effects. Never fails the caller; delivery problems are only logged.
pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, event: DispatchEvent);

    fn notify(&self, address: &str, message: String) {
        self.dispatch(DispatchEvent::Notify {
            address: address.to_string(),
            message,
        })
    }

    fn enqueue_transaction_processing(&self, address: &str) {
        self.dispatch(DispatchEvent::ProcessTransactions {
            address: address.to_string(),
        })
    }

    fn set_transaction_status(&self, transaction_id: i64, status: TransactionStatus) {
        self.dispatch(DispatchEvent::SetTransactionStatus {
            transaction_id,
            status,
        })
    }

    fn request_wildcard_token_refresh(&self, address: &str) {
        self.dispatch(DispatchEvent::WildcardTokenRefresh {
            address: address.to_string(),
        })
    }

    fn track(&self, sender_id: Option<&str>, event: &str, data: Value) {
        self.dispatch(DispatchEvent::Track {
            sender_id: sender_id.map(|s| s.to_string()),
            event: event.to_string(),
            data,
        })
    }
}

#[derive(Clone, Debug)]
pub struct ChannelDispatcher {
    sender: UnboundedSender<DispatchEvent>,
}

impl ChannelDispatcher {
    pub fn new() -> (Self, UnboundedReceiver<DispatchEvent>) {
        let (sender, receiver) = unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl Dispatcher for ChannelDispatcher {
    fn dispatch(&self, event: DispatchEvent) {
        if let Err(err) = self.sender.send(event) {
            log::warn!("Dispatch channel closed, dropping event: {:?}", err.0);
        }
    }
}
