use serde::{
    Deserialize,
    Serialize,
};
use std::{
    collections::HashMap,
    fmt,
    str::FromStr,
    sync::{
        Arc,
        Mutex,
    },
};
use thiserror::Error;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Cancelled,
    Failed,
}

impl PaymentStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Cancelled => "cancelled",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" | "processing" => Ok(PaymentStatus::Pending),
            "paid" | "completed" => Ok(PaymentStatus::Paid),
            "cancelled" | "canceled" => Ok(PaymentStatus::Cancelled),
            "failed" => Ok(PaymentStatus::Failed),
            _ => Err(PaymentError::UnknownStatus(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    #[error("unknown payment status '{0}'")]
    UnknownStatus(String),
    #[error("no payment tracked for invoice '{0}'")]
    UnknownInvoice(String),
    #[error("invoice '{invoice_id}' cannot move from {from} to {to}")]
    InvalidTransition {
        invoice_id: String,
        from: PaymentStatus,
        to: PaymentStatus,
    },
    #[error("invoice '{0}' is already being tracked")]
    AlreadyTracked(String),
}

/// Status stream per invoice.
///
/// The host reports invoice outcomes through `notify`; every
/// `PaymentSubscription` for that invoice observes the change.
#[derive(Debug, Clone, Default)]
pub struct PaymentTracker {
    invoices: Arc<Mutex<HashMap<String, watch::Sender<PaymentStatus>>>>,
}

impl PaymentTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking `invoice_id` in the `Pending` state.
    pub fn track(
        &self,
        invoice_id: impl Into<String>,
    ) -> Result<PaymentSubscription, PaymentError> {
        let invoice_id = invoice_id.into();
        let mut guard = self.invoices.lock().unwrap_or_else(|e| e.into_inner());
        if guard.contains_key(&invoice_id) {
            return Err(PaymentError::AlreadyTracked(invoice_id));
        }
        let (tx, rx) = watch::channel(PaymentStatus::Pending);
        guard.insert(invoice_id.clone(), tx);
        tracing::debug!(%invoice_id, "tracking invoice");
        Ok(PaymentSubscription { invoice_id, rx })
    }

    /// Another subscription to an invoice that is already tracked.
    pub fn subscribe(&self, invoice_id: &str) -> Result<PaymentSubscription, PaymentError> {
        let guard = self.invoices.lock().unwrap_or_else(|e| e.into_inner());
        let tx = guard
            .get(invoice_id)
            .ok_or_else(|| PaymentError::UnknownInvoice(invoice_id.to_string()))?;
        Ok(PaymentSubscription {
            invoice_id: invoice_id.to_string(),
            rx: tx.subscribe(),
        })
    }

    /// Records a status reported by the host.
    ///
    /// Only `Pending -> Paid | Cancelled | Failed` is accepted; repeating
    /// `Pending` is a no-op.
    pub fn notify(&self, invoice_id: &str, status: PaymentStatus) -> Result<(), PaymentError> {
        let guard = self.invoices.lock().unwrap_or_else(|e| e.into_inner());
        let tx = guard
            .get(invoice_id)
            .ok_or_else(|| PaymentError::UnknownInvoice(invoice_id.to_string()))?;
        let current = *tx.borrow();
        if current == status && !status.is_terminal() {
            return Ok(());
        }
        if current.is_terminal() || !status.is_terminal() {
            return Err(PaymentError::InvalidTransition {
                invoice_id: invoice_id.to_string(),
                from: current,
                to: status,
            });
        }
        tx.send_replace(status);
        tracing::info!(%invoice_id, %status, "invoice settled");
        Ok(())
    }

    /// Like `notify`, for the raw status string the host hands back.
    pub fn notify_raw(&self, invoice_id: &str, status: &str) -> Result<(), PaymentError> {
        self.notify(invoice_id, status.parse()?)
    }

    pub fn cancel(&self, invoice_id: &str) -> Result<(), PaymentError> {
        self.notify(invoice_id, PaymentStatus::Cancelled)
    }

    pub fn status(&self, invoice_id: &str) -> Option<PaymentStatus> {
        let guard = self.invoices.lock().unwrap_or_else(|e| e.into_inner());
        guard.get(invoice_id).map(|tx| *tx.borrow())
    }

    pub fn pending_count(&self) -> usize {
        let guard = self.invoices.lock().unwrap_or_else(|e| e.into_inner());
        guard
            .values()
            .filter(|tx| !tx.borrow().is_terminal())
            .count()
    }

    /// Forgets settled invoices.
    pub fn prune(&self) {
        let mut guard = self.invoices.lock().unwrap_or_else(|e| e.into_inner());
        guard.retain(|_, tx| !tx.borrow().is_terminal());
    }
}

#[derive(Debug, Clone)]
pub struct PaymentSubscription {
    invoice_id: String,
    rx: watch::Receiver<PaymentStatus>,
}

impl PaymentSubscription {
    pub fn invoice_id(&self) -> &str {
        &self.invoice_id
    }

    pub fn current(&self) -> PaymentStatus {
        *self.rx.borrow()
    }

    /// Waits for the invoice to settle.
    ///
    /// Resolves as `Cancelled` if the tracker goes away first.
    pub async fn terminal(&mut self) -> PaymentStatus {
        match self.rx.wait_for(|status| status.is_terminal()).await {
            Ok(status) => *status,
            Err(_) => PaymentStatus::Cancelled,
        }
    }

    /// Next status change, or `None` once the tracker is gone.
    pub async fn next(&mut self) -> Option<PaymentStatus> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }
}
