use crate::{
    account::{
        HistoryEntry,
        InventoryItem,
        ItemSale,
        UserProfile,
        history_from_dto,
        history_from_ledger,
    },
    backend::CasesBackend,
    cases::{
        Case,
        CaseItem,
        CaseOpening,
        InvalidCase,
        won_item,
    },
    payments::{
        PaymentError,
        PaymentStatus,
        PaymentSubscription,
    },
    roulette::{
        RouletteStrip,
        STRIP_LEN,
    },
    services::AppServices,
};
use demo_store::{
    ENTRY_PREFIX,
    InsufficientBalance,
    ItemNotFound,
    StoredItem,
};
use lootcase_api::ApiError;
use lootcase_core::{
    FallbackError,
    ForceMode,
    OperationResult,
    RandomSource,
    SelectionError,
    selector,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    InvalidCase(#[from] InvalidCase),
    #[error(transparent)]
    Payment(#[from] PaymentError),
    #[error("insufficient balance: {balance} stars available, {price} required")]
    InsufficientBalance { balance: u64, price: u64 },
    #[error(transparent)]
    DemoStore(anyhow::Error),
    #[error("unknown case '{0}'")]
    UnknownCase(String),
    #[error("backend opened the case but returned no item")]
    MissingItem,
    #[error("no inventory item '{0}'")]
    ItemNotFound(String),
    #[error("deposit amount must be positive")]
    InvalidAmount,
    #[error("{0} not supported by the host platform")]
    Unsupported(&'static str),
    #[error("operation cancelled")]
    Cancelled,
}

impl ControllerError {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ControllerError::Api(err) => err.kind(),
            ControllerError::Selection(_) => "selection",
            ControllerError::InvalidCase(_) => "invalid_case",
            ControllerError::Payment(_) => "payment",
            ControllerError::InsufficientBalance { .. } => "insufficient_balance",
            ControllerError::DemoStore(_) => "demo_store",
            ControllerError::UnknownCase(_) => "unknown_case",
            ControllerError::MissingItem => "missing_item",
            ControllerError::ItemNotFound(_) => "item_not_found",
            ControllerError::InvalidAmount => "invalid_amount",
            ControllerError::Unsupported(_) => "unsupported",
            ControllerError::Cancelled => "cancelled",
        }
    }

    /// A failed backend purchase that may still have been charged.
    pub fn may_have_charged(&self) -> bool {
        match self {
            ControllerError::Api(err) => err.may_have_reached_backend(),
            ControllerError::MissingItem => true,
            _ => false,
        }
    }
}

impl From<FallbackError<ControllerError>> for ControllerError {
    fn from(err: FallbackError<ControllerError>) -> Self {
        match err {
            FallbackError::Operation(err) => err,
            FallbackError::Cancelled => ControllerError::Cancelled,
        }
    }
}

impl From<anyhow::Error> for ControllerError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(InsufficientBalance { balance, price }) = err.downcast_ref::<InsufficientBalance>() {
            return ControllerError::InsufficientBalance {
                balance: *balance,
                price: *price,
            };
        }
        if let Some(ItemNotFound(id)) = err.downcast_ref::<ItemNotFound>() {
            return ControllerError::ItemNotFound(id.clone());
        }
        ControllerError::DemoStore(err)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spin {
    pub strip: RouletteStrip,
    pub offset: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemOdds {
    pub item: CaseItem,
    pub probability: f64,
}

/// Case listing and opening, backend first with the demo catalogue behind it.
pub struct CaseController<'a, B, R> {
    services: &'a AppServices<B, R>,
}

impl<'a, B, R> CaseController<'a, B, R>
where
    B: CasesBackend,
    R: RandomSource,
{
    pub fn new(services: &'a AppServices<B, R>) -> Self {
        Self { services }
    }

    pub async fn list_cases(&self) -> Result<OperationResult<Vec<Case>>, ControllerError> {
        let result = self
            .services
            .run(|| self.fetch_cases(), || async { Ok(self.demo_cases()) })
            .await?;
        if result.is_fallback() {
            tracing::warn!("case list unavailable, showing demo cases");
        }
        Ok(result)
    }

    pub async fn load_case(
        &self,
        case_id: &str,
    ) -> Result<OperationResult<Case>, ControllerError> {
        let result = self
            .services
            .run(
                || self.fetch_case(case_id),
                || async { self.demo_case(case_id) },
            )
            .await?;
        if result.is_fallback() {
            tracing::warn!(case_id, demo_case = %result.value.id, "case unavailable, using demo case");
        }
        Ok(result)
    }

    /// Drop probability of every item in the case, in case order.
    pub async fn odds(
        &self,
        case_id: &str,
    ) -> Result<OperationResult<Vec<ItemOdds>>, ControllerError> {
        let loaded = self.load_case(case_id).await?;
        let probabilities = selector::probabilities(&loaded.value.items)?;
        Ok(loaded.map(|case| {
            case.items
                .into_iter()
                .zip(probabilities)
                .map(|(item, probability)| ItemOdds { item, probability })
                .collect()
        }))
    }

    /// Opens a case on the backend, or in the demo wallet when that fails.
    ///
    /// A case that was itself loaded from the demo catalogue is opened in the
    /// demo wallet directly.
    pub async fn open_case(
        &self,
        case_id: &str,
    ) -> Result<OperationResult<CaseOpening>, ControllerError> {
        let loaded = self.load_case(case_id).await?;
        if loaded.is_fallback() {
            return self.demo_open(&loaded.value).map(OperationResult::fallback);
        }
        let case = loaded.into_value();
        let result = self
            .services
            .run(
                || self.remote_open(&case),
                || async { self.demo_open(&case) },
            )
            .await?;
        if result.is_fallback() {
            tracing::warn!(case_id = %case.id, "backend opening failed, opened in demo mode");
        }
        tracing::info!(
            case_id = %result.value.case.id,
            item = %result.value.item.name,
            rarity = result.value.item.rarity_label(),
            new_balance = result.value.new_balance,
            "case opened"
        );
        Ok(result)
    }

    /// Opens the same case `count` times, stopping at the first failure.
    pub async fn open_many(
        &self,
        case_id: &str,
        count: usize,
    ) -> Result<Vec<OperationResult<CaseOpening>>, ControllerError> {
        let mut openings = Vec::with_capacity(count);
        for _ in 0..count {
            openings.push(self.open_case(case_id).await?);
        }
        Ok(openings)
    }

    /// Strip for the spin animation ending on `won`, with its stopping offset.
    pub fn spin(
        &self,
        case: &Case,
        won: &CaseItem,
        container_width: f64,
    ) -> Result<Spin, ControllerError> {
        let mut selector = self.services.selector();
        let rng = selector.rng_mut();
        let strip = RouletteStrip::build(&case.items, won, STRIP_LEN, rng)?;
        let offset = strip.final_offset(container_width, rng);
        Ok(Spin { strip, offset })
    }

    async fn fetch_cases(&self) -> Result<Vec<Case>, ControllerError> {
        let backend = self.services.backend();
        let dtos = self.services.retry().run(|| backend.list_cases()).await?;
        Ok(dtos.into_iter().map(Case::from_summary).collect())
    }

    async fn fetch_case(&self, case_id: &str) -> Result<Case, ControllerError> {
        let backend = self.services.backend();
        let dto = self
            .services
            .retry()
            .run(|| backend.case_details(case_id))
            .await?;
        Ok(Case::try_from(dto)?)
    }

    async fn remote_open(&self, case: &Case) -> Result<CaseOpening, ControllerError> {
        let opened = self.open_on_backend(case).await;
        if let Err(err) = &opened {
            tracing::warn!(
                case_id = %case.id,
                kind = err.kind(),
                may_have_charged = err.may_have_charged(),
                error = %err,
                "backend opening failed"
            );
        }
        opened
    }

    async fn open_on_backend(&self, case: &Case) -> Result<CaseOpening, ControllerError> {
        let backend = self.services.backend();
        let user_id = self.services.user_id();
        // not idempotent, so only retried when the request never left
        let response = self
            .services
            .retry()
            .run_if(|| backend.open_case(&case.id, user_id), ApiError::is_connect)
            .await?;
        let item = response.item.ok_or(ControllerError::MissingItem)?;
        Ok(CaseOpening {
            case: case.clone(),
            item: won_item(case, item),
            new_balance: response.new_balance,
        })
    }

    fn demo_cases(&self) -> Vec<Case> {
        self.services.catalogue().cases().to_vec()
    }

    fn demo_case(&self, case_id: &str) -> Result<Case, ControllerError> {
        self.services
            .catalogue()
            .case_or_default(case_id)
            .cloned()
            .ok_or_else(|| ControllerError::UnknownCase(case_id.to_string()))
    }

    fn demo_open(&self, case: &Case) -> Result<CaseOpening, ControllerError> {
        let wallet = self.services.wallet();
        let balance = wallet.balance()?;
        if !case.can_afford(balance) {
            return Err(ControllerError::InsufficientBalance {
                balance,
                price: case.price_stars,
            });
        }
        let item = self.services.selector().pick(&case.items)?.clone();
        let stored = StoredItem::new(
            item.id.clone(),
            item.name.clone(),
            item.rarity_label(),
            item.value_stars,
            case.id.clone(),
        );
        let new_balance = wallet.record_opening(case.price_stars, stored)?;
        Ok(CaseOpening {
            case: case.clone(),
            item,
            new_balance,
        })
    }
}

/// Outcome of a deposit request.
#[derive(Debug)]
pub enum Deposit {
    /// Demo wallet credited straight away.
    Credited { new_balance: u64 },
    /// Invoice issued; the subscription settles once the host reports back.
    Invoice {
        link: String,
        subscription: PaymentSubscription,
    },
}

pub struct BalanceController<'a, B, R> {
    services: &'a AppServices<B, R>,
}

impl<'a, B, R> BalanceController<'a, B, R>
where
    B: CasesBackend,
    R: RandomSource,
{
    pub fn new(services: &'a AppServices<B, R>) -> Self {
        Self { services }
    }

    pub async fn balance(&self) -> Result<OperationResult<u64>, ControllerError> {
        self.services
            .run(
                || self.remote_balance(),
                || async { self.demo_balance() },
            )
            .await
    }

    /// Tops up by `amount` stars: a Stars invoice when the host can pay one,
    /// otherwise a demo credit.
    pub async fn deposit(&self, amount: u64) -> Result<OperationResult<Deposit>, ControllerError> {
        if amount == 0 {
            return Err(ControllerError::InvalidAmount);
        }
        let result = self
            .services
            .run(
                || self.request_invoice(amount),
                || async { self.demo_credit(amount) },
            )
            .await?;
        if result.is_fallback() {
            tracing::info!(amount, "demo wallet credited");
        }
        Ok(result)
    }

    /// Waits for the invoice to settle and drops cached balances once paid.
    ///
    /// Settles on the first of: a status reported through the tracker, a
    /// terminal status polled from the backend, cancellation. Gives up with
    /// `Pending` once the payment timeout passes.
    pub async fn complete_deposit(
        &self,
        subscription: &mut PaymentSubscription,
    ) -> PaymentStatus {
        let invoice_id = subscription.invoice_id().to_string();
        let timeout = self.services.payment_config().timeout();
        let status = tokio::select! {
            biased;
            _ = self.services.cancellation().cancelled() => {
                if let Err(err) = self.services.payments().cancel(&invoice_id) {
                    tracing::debug!(%err, "invoice already settled");
                }
                PaymentStatus::Cancelled
            }
            status = subscription.terminal() => status,
            status = self.watch_transaction(&invoice_id) => status,
            _ = tokio::time::sleep(timeout) => PaymentStatus::Pending,
        };
        match status {
            PaymentStatus::Paid => {
                self.services.backend().forget_user_data();
                tracing::info!(%invoice_id, "deposit paid");
            }
            PaymentStatus::Pending => {
                tracing::warn!(%invoice_id, ?timeout, "deposit not confirmed in time");
            }
            other => {
                tracing::warn!(%invoice_id, status = %other, "deposit not completed");
            }
        }
        status
    }

    /// Items owned on the backend, or in the demo wallet.
    pub async fn inventory(&self) -> Result<OperationResult<Vec<InventoryItem>>, ControllerError> {
        let result = self
            .services
            .run(
                || self.remote_inventory(),
                || async { self.demo_inventory() },
            )
            .await?;
        if result.is_fallback() {
            tracing::warn!("inventory unavailable, showing demo items");
        }
        Ok(result)
    }

    /// Sells an inventory item for its value in stars.
    ///
    /// Demo entries are sold from the demo wallet directly unless the mode
    /// forces the backend.
    pub async fn sell_item(
        &self,
        item_id: &str,
    ) -> Result<OperationResult<ItemSale>, ControllerError> {
        let force_mode = self.services.executor().options().force_mode;
        if item_id.starts_with(ENTRY_PREFIX) && force_mode != ForceMode::Primary {
            return self.demo_sell(item_id).map(OperationResult::fallback);
        }
        let result = self
            .services
            .run(
                || self.remote_sell(item_id),
                || async { self.demo_sell(item_id) },
            )
            .await?;
        if result.is_fallback() {
            tracing::warn!(item_id, "backend sale failed, sold from demo wallet");
        }
        tracing::info!(
            item_id,
            stars_earned = result.value.stars_earned,
            new_balance = result.value.new_balance,
            "item sold"
        );
        Ok(result)
    }

    pub async fn profile(&self) -> Result<OperationResult<UserProfile>, ControllerError> {
        self.services
            .run(
                || self.remote_profile(),
                || async { self.demo_profile() },
            )
            .await
    }

    /// Balance movements, newest first.
    pub async fn history(&self) -> Result<OperationResult<Vec<HistoryEntry>>, ControllerError> {
        self.services
            .run(
                || self.remote_history(),
                || async { self.demo_history() },
            )
            .await
    }

    async fn remote_balance(&self) -> Result<u64, ControllerError> {
        let backend = self.services.backend();
        let user_id = self.services.user_id();
        let dto = self.services.retry().run(|| backend.balance(user_id)).await?;
        Ok(dto.balance_stars)
    }

    fn demo_balance(&self) -> Result<u64, ControllerError> {
        Ok(self.services.wallet().balance()?)
    }

    fn demo_credit(&self, amount: u64) -> Result<Deposit, ControllerError> {
        let new_balance = self.services.wallet().credit(amount)?;
        Ok(Deposit::Credited { new_balance })
    }

    async fn watch_transaction(&self, invoice_id: &str) -> PaymentStatus {
        let backend = self.services.backend();
        let interval = self.services.payment_config().poll_interval();
        loop {
            match self
                .services
                .retry()
                .run(|| backend.transaction_status(invoice_id))
                .await
            {
                Ok(transaction) => match transaction.status.parse::<PaymentStatus>() {
                    Ok(status) if status.is_terminal() => {
                        let payments = self.services.payments();
                        if let Err(err) = payments.notify(invoice_id, status) {
                            tracing::debug!(%err, "invoice already settled");
                        }
                        return payments.status(invoice_id).unwrap_or(status);
                    }
                    Ok(_) => {}
                    Err(err) => tracing::warn!(%invoice_id, %err, "unrecognised payment status"),
                },
                Err(err) => {
                    tracing::warn!(%invoice_id, error = %err, "could not check payment status");
                }
            }
            tokio::time::sleep(interval).await;
        }
    }

    async fn remote_inventory(&self) -> Result<Vec<InventoryItem>, ControllerError> {
        let backend = self.services.backend();
        let user_id = self.services.user_id();
        let items = self.services.retry().run(|| backend.inventory(user_id)).await?;
        Ok(items.into_iter().map(InventoryItem::from).collect())
    }

    fn demo_inventory(&self) -> Result<Vec<InventoryItem>, ControllerError> {
        let items = self.services.wallet().inventory()?;
        Ok(items.into_iter().map(InventoryItem::from).collect())
    }

    async fn remote_sell(&self, item_id: &str) -> Result<ItemSale, ControllerError> {
        let backend = self.services.backend();
        let user_id = self.services.user_id();
        let response = self
            .services
            .retry()
            .run_if(|| backend.sell_item(item_id, user_id), ApiError::is_connect)
            .await?;
        Ok(ItemSale::from_response(item_id, response))
    }

    fn demo_sell(&self, item_id: &str) -> Result<ItemSale, ControllerError> {
        let (sold, new_balance) = self.services.wallet().sell(item_id)?;
        Ok(ItemSale {
            item_id: sold.entry_id,
            stars_earned: sold.value_stars,
            new_balance,
        })
    }

    async fn remote_profile(&self) -> Result<UserProfile, ControllerError> {
        let backend = self.services.backend();
        let user_id = self.services.user_id();
        let dto = self.services.retry().run(|| backend.profile(user_id)).await?;
        Ok(dto.into())
    }

    fn demo_profile(&self) -> Result<UserProfile, ControllerError> {
        let record = self.services.wallet().load()?;
        Ok(UserProfile::from(&record))
    }

    async fn remote_history(&self) -> Result<Vec<HistoryEntry>, ControllerError> {
        let backend = self.services.backend();
        let user_id = self.services.user_id();
        let dto = self.services.retry().run(|| backend.history(user_id)).await?;
        Ok(history_from_dto(dto))
    }

    fn demo_history(&self) -> Result<Vec<HistoryEntry>, ControllerError> {
        Ok(history_from_ledger(self.services.wallet().ledger()?))
    }

    async fn request_invoice(&self, amount: u64) -> Result<Deposit, ControllerError> {
        if !self.services.capabilities().invoices {
            return Err(ControllerError::Unsupported("Stars invoices"));
        }
        let backend = self.services.backend();
        let user_id = self.services.user_id();
        let invoice = self
            .services
            .retry()
            .run_if(
                || backend.create_stars_invoice(user_id, amount),
                ApiError::is_connect,
            )
            .await?;
        let subscription = self.services.payments().track(invoice.transaction_id)?;
        tracing::info!(invoice_id = subscription.invoice_id(), amount, "stars invoice created");
        Ok(Deposit::Invoice {
            link: invoice.invoice_link,
            subscription,
        })
    }
}
