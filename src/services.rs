use crate::{
    backend::CasesBackend,
    capabilities::PlatformCapabilities,
    cases::DemoCatalogue,
    config::{
        AppConfig,
        PaymentConfig,
    },
    controller::{
        BalanceController,
        CaseController,
        ControllerError,
    },
    payments::PaymentTracker,
};
use demo_store::DemoWalletStore;
use lootcase_api::ApiClient;
use lootcase_core::{
    FallbackExecutor,
    OperationResult,
    RandomSource,
    RetryPolicy,
    WeightedSelector,
};
use rand::rngs::StdRng;
use std::sync::{
    Mutex,
    MutexGuard,
};
use tokio_util::sync::CancellationToken;

/// Everything the controllers need, built once at startup.
pub struct AppServices<B, R = StdRng> {
    backend: B,
    wallet: DemoWalletStore,
    catalogue: DemoCatalogue,
    executor: FallbackExecutor,
    retry: RetryPolicy,
    selector: Mutex<WeightedSelector<R>>,
    payments: PaymentTracker,
    payment_config: PaymentConfig,
    capabilities: PlatformCapabilities,
    user_id: u64,
    cancel: CancellationToken,
}

impl AppServices<ApiClient, StdRng> {
    /// Wires the HTTP backend, demo wallet and platform capabilities from `config`.
    pub fn bootstrap(config: &AppConfig, rng: StdRng) -> Result<Self, ControllerError> {
        let backend = ApiClient::new(config.api_config())?;
        let wallet = DemoWalletStore::open(config.demo_dir())?;
        tracing::info!(
            api_url = backend.base_url(),
            demo_wallet = %wallet.path().display(),
            mode = %config.force_mode,
            "services ready"
        );
        Ok(Self::new(backend, wallet, rng, config))
    }
}

impl<B, R> AppServices<B, R>
where
    B: CasesBackend,
    R: RandomSource,
{
    pub fn new(backend: B, wallet: DemoWalletStore, rng: R, config: &AppConfig) -> Self {
        Self {
            backend,
            wallet,
            catalogue: DemoCatalogue::default(),
            executor: FallbackExecutor::with_mode(config.force_mode),
            retry: config.retry_policy(),
            selector: Mutex::new(WeightedSelector::new(rng)),
            payments: PaymentTracker::new(),
            payment_config: config.payment.clone(),
            capabilities: PlatformCapabilities::detect(config.platform_version.as_deref()),
            user_id: config.user_id,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_catalogue(mut self, catalogue: DemoCatalogue) -> Self {
        self.catalogue = catalogue;
        self
    }

    pub fn cases(&self) -> CaseController<'_, B, R> {
        CaseController::new(self)
    }

    pub fn balances(&self) -> BalanceController<'_, B, R> {
        BalanceController::new(self)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn wallet(&self) -> &DemoWalletStore {
        &self.wallet
    }

    pub fn catalogue(&self) -> &DemoCatalogue {
        &self.catalogue
    }

    pub fn executor(&self) -> &FallbackExecutor {
        &self.executor
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn payments(&self) -> &PaymentTracker {
        &self.payments
    }

    pub fn payment_config(&self) -> &PaymentConfig {
        &self.payment_config
    }

    pub fn capabilities(&self) -> &PlatformCapabilities {
        &self.capabilities
    }

    pub fn user_id(&self) -> u64 {
        self.user_id
    }

    /// Cancelling this abandons in-flight backend calls.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Primary with fallback under the configured mode, abandoning the
    /// primary once `cancellation()` fires.
    pub(crate) async fn run<T, P, PFut, F, FFut>(
        &self,
        primary: P,
        fallback: F,
    ) -> Result<OperationResult<T>, ControllerError>
    where
        P: FnOnce() -> PFut,
        PFut: Future<Output = Result<T, ControllerError>>,
        F: FnOnce() -> FFut,
        FFut: Future<Output = Result<T, ControllerError>>,
    {
        Ok(self
            .executor
            .run_cancellable(primary, fallback, &self.cancel)
            .await?)
    }

    pub(crate) fn selector(&self) -> MutexGuard<'_, WeightedSelector<R>> {
        self.selector.lock().unwrap_or_else(|e| e.into_inner())
    }
}
