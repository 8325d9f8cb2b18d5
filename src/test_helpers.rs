use crate::{
    backend::CasesBackend,
    config::{
        AppConfig,
        PaymentConfig,
        RetryConfig,
    },
    services::AppServices,
};
use demo_store::DemoWalletStore;
use lootcase_api::{
    ApiError,
    StatusCode,
    dto::{
        BalanceDto,
        CaseDto,
        CaseItemDto,
        HistoryDto,
        InventoryItemDto,
        OpenCaseResponseDto,
        SellItemResponseDto,
        StarsInvoiceDto,
        TransactionDto,
        UserProfileDto,
    },
};
use lootcase_core::{
    FixedSequence,
    ForceMode,
};
use std::sync::{
    Arc,
    Mutex,
};
use tempfile::TempDir;

/// How a fake endpoint should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// 503, retried by the client policy.
    Unavailable,
    /// 404, never retried.
    NotFound,
    /// Request timed out.
    Timeout,
    /// Backend answered `success: false`.
    Rejected,
}

impl Failure {
    fn into_error(self, path: &str) -> ApiError {
        let url = format!("fake://backend{path}");
        match self {
            Failure::Unavailable => ApiError::Status {
                url,
                status: StatusCode::SERVICE_UNAVAILABLE,
                body: "Service Unavailable".to_string(),
            },
            Failure::NotFound => ApiError::Status {
                url,
                status: StatusCode::NOT_FOUND,
                body: "Not found".to_string(),
            },
            Failure::Timeout => ApiError::Timeout { url },
            Failure::Rejected => ApiError::Rejected("Insufficient balance".to_string()),
        }
    }
}

#[derive(Debug, Clone)]
struct FakeTransaction {
    id: String,
    amount: u64,
    status: String,
    pending_polls: usize,
}

#[derive(Debug, Default)]
struct FakeState {
    cases: Vec<CaseDto>,
    balance: u64,
    inventory: Vec<InventoryItemDto>,
    transactions: Vec<FakeTransaction>,
    available: bool,
    fail_cases: Option<Failure>,
    fail_open: Option<Failure>,
    fail_balance: Option<Failure>,
    fail_invoice: Option<Failure>,
    fail_inventory: Option<Failure>,
    list_calls: usize,
    details_calls: usize,
    open_calls: usize,
    balance_calls: usize,
    invoice_calls: usize,
    transaction_calls: usize,
    sell_calls: usize,
    forget_calls: usize,
    cases_opened: u64,
    next_transaction: u64,
}

/// In-memory backend with failure toggles and call counters.
#[derive(Debug, Clone)]
pub struct FakeBackend {
    state: Arc<Mutex<FakeState>>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeBackend {
    /// One case (`"7"`, 100 stars) with a common coin and a legendary crown.
    pub fn new() -> Self {
        let state = FakeState {
            cases: vec![fake_case()],
            balance: 500,
            available: true,
            next_transaction: 1,
            ..FakeState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut FakeState) -> T) -> T {
        let mut guard = self.state.lock().unwrap();
        f(&mut guard)
    }

    pub fn set_available(&self, available: bool) {
        self.with_state(|s| s.available = available);
    }

    pub fn set_balance(&self, balance: u64) {
        self.with_state(|s| s.balance = balance);
    }

    pub fn set_cases(&self, cases: Vec<CaseDto>) {
        self.with_state(|s| s.cases = cases);
    }

    pub fn fail_cases(&self, failure: Option<Failure>) {
        self.with_state(|s| s.fail_cases = failure);
    }

    pub fn fail_open(&self, failure: Option<Failure>) {
        self.with_state(|s| s.fail_open = failure);
    }

    pub fn fail_balance(&self, failure: Option<Failure>) {
        self.with_state(|s| s.fail_balance = failure);
    }

    /// Payment endpoints: invoices and transaction lookups.
    pub fn fail_invoice(&self, failure: Option<Failure>) {
        self.with_state(|s| s.fail_invoice = failure);
    }

    pub fn fail_inventory(&self, failure: Option<Failure>) {
        self.with_state(|s| s.fail_inventory = failure);
    }

    /// The transaction reports `pending` for `after_polls` more lookups, then
    /// `status`.
    pub fn settle_transaction(&self, transaction_id: &str, status: &str, after_polls: usize) {
        self.with_state(|s| {
            if let Some(tx) = s.transactions.iter_mut().find(|tx| tx.id == transaction_id) {
                tx.status = status.to_string();
                tx.pending_polls = after_polls;
            }
        });
    }

    /// Items the backend holds for the user.
    pub fn inventory(&self) -> Vec<InventoryItemDto> {
        self.with_state(|s| s.inventory.clone())
    }

    pub fn balance(&self) -> u64 {
        self.with_state(|s| s.balance)
    }

    /// Every endpoint answers 503 and health checks fail.
    pub fn go_offline(&self) {
        self.with_state(|s| {
            s.available = false;
            s.fail_cases = Some(Failure::Unavailable);
            s.fail_open = Some(Failure::Unavailable);
            s.fail_balance = Some(Failure::Unavailable);
            s.fail_invoice = Some(Failure::Unavailable);
            s.fail_inventory = Some(Failure::Unavailable);
        });
    }

    pub fn list_calls(&self) -> usize {
        self.with_state(|s| s.list_calls)
    }

    pub fn details_calls(&self) -> usize {
        self.with_state(|s| s.details_calls)
    }

    pub fn open_calls(&self) -> usize {
        self.with_state(|s| s.open_calls)
    }

    pub fn balance_calls(&self) -> usize {
        self.with_state(|s| s.balance_calls)
    }

    pub fn invoice_calls(&self) -> usize {
        self.with_state(|s| s.invoice_calls)
    }

    pub fn transaction_calls(&self) -> usize {
        self.with_state(|s| s.transaction_calls)
    }

    pub fn sell_calls(&self) -> usize {
        self.with_state(|s| s.sell_calls)
    }

    pub fn forget_calls(&self) -> usize {
        self.with_state(|s| s.forget_calls)
    }
}

impl CasesBackend for FakeBackend {
    async fn check_availability(&self) -> bool {
        self.with_state(|s| s.available)
    }

    async fn list_cases(&self) -> Result<Vec<CaseDto>, ApiError> {
        self.with_state(|s| {
            s.list_calls += 1;
            match s.fail_cases {
                Some(failure) => Err(failure.into_error("/cases/")),
                None => Ok(s.cases.clone()),
            }
        })
    }

    async fn case_details(&self, case_id: &str) -> Result<CaseDto, ApiError> {
        let path = format!("/cases/{case_id}");
        self.with_state(|s| {
            s.details_calls += 1;
            if let Some(failure) = s.fail_cases {
                return Err(failure.into_error(&path));
            }
            s.cases
                .iter()
                .find(|case| case.id == case_id)
                .cloned()
                .ok_or_else(|| Failure::NotFound.into_error(&path))
        })
    }

    async fn open_case(
        &self,
        case_id: &str,
        _user_id: u64,
    ) -> Result<OpenCaseResponseDto, ApiError> {
        let path = format!("/cases/{case_id}/open");
        self.with_state(|s| {
            s.open_calls += 1;
            if let Some(failure) = s.fail_open {
                return Err(failure.into_error(&path));
            }
            let case = s
                .cases
                .iter()
                .find(|case| case.id == case_id)
                .cloned()
                .ok_or_else(|| Failure::NotFound.into_error(&path))?;
            if s.balance < case.price_stars {
                return Err(Failure::Rejected.into_error(&path));
            }
            s.balance -= case.price_stars;
            // the fake backend always awards the last item
            let won = case
                .items
                .last()
                .ok_or_else(|| Failure::NotFound.into_error(&path))?;
            s.cases_opened += 1;
            let item = InventoryItemDto {
                id: format!("inv-{}", s.cases_opened),
                item_name: won.name.clone(),
                item_stars: won.stars,
                rarity: won.rarity.clone(),
                image_url: None,
                case_name: Some(case.name.clone()),
                created_at: None,
            };
            s.inventory.push(item.clone());
            Ok(OpenCaseResponseDto {
                success: true,
                item: Some(item),
                new_balance: s.balance,
                message: "ok".to_string(),
            })
        })
    }

    async fn balance(&self, _user_id: u64) -> Result<BalanceDto, ApiError> {
        self.with_state(|s| {
            s.balance_calls += 1;
            match s.fail_balance {
                Some(failure) => Err(failure.into_error("/users/balance")),
                None => Ok(BalanceDto {
                    balance_stars: s.balance,
                }),
            }
        })
    }

    async fn create_stars_invoice(
        &self,
        _user_id: u64,
        stars_amount: u64,
    ) -> Result<StarsInvoiceDto, ApiError> {
        self.with_state(|s| {
            s.invoice_calls += 1;
            if let Some(failure) = s.fail_invoice {
                return Err(failure.into_error("/payments/stars/invoice"));
            }
            let transaction_id = format!("tx-{}", s.next_transaction);
            s.next_transaction += 1;
            s.transactions.push(FakeTransaction {
                id: transaction_id.clone(),
                amount: stars_amount,
                status: "pending".to_string(),
                pending_polls: 0,
            });
            Ok(StarsInvoiceDto {
                invoice_link: format!("https://t.me/$invoice-{stars_amount}"),
                transaction_id,
            })
        })
    }

    async fn transaction_status(&self, transaction_id: &str) -> Result<TransactionDto, ApiError> {
        let path = format!("/payments/transaction/{transaction_id}");
        self.with_state(|s| {
            s.transaction_calls += 1;
            if let Some(failure) = s.fail_invoice {
                return Err(failure.into_error(&path));
            }
            let tx = s
                .transactions
                .iter_mut()
                .find(|tx| tx.id == transaction_id)
                .ok_or_else(|| Failure::NotFound.into_error(&path))?;
            let status = if tx.pending_polls > 0 {
                tx.pending_polls -= 1;
                "pending".to_string()
            } else {
                tx.status.clone()
            };
            Ok(fake_transaction(tx, status))
        })
    }

    async fn inventory(&self, _user_id: u64) -> Result<Vec<InventoryItemDto>, ApiError> {
        self.with_state(|s| match s.fail_inventory {
            Some(failure) => Err(failure.into_error("/inventory")),
            None => Ok(s.inventory.iter().rev().cloned().collect()),
        })
    }

    async fn sell_item(
        &self,
        item_id: &str,
        _user_id: u64,
    ) -> Result<SellItemResponseDto, ApiError> {
        let path = format!("/inventory/{item_id}/sell");
        self.with_state(|s| {
            s.sell_calls += 1;
            if let Some(failure) = s.fail_inventory {
                return Err(failure.into_error(&path));
            }
            let position = s
                .inventory
                .iter()
                .position(|item| item.id == item_id)
                .ok_or_else(|| Failure::NotFound.into_error(&path))?;
            let item = s.inventory.remove(position);
            s.balance += item.item_stars;
            Ok(SellItemResponseDto {
                success: true,
                stars_earned: item.item_stars,
                new_balance: s.balance,
                message: format!("sold {}", item.item_name),
            })
        })
    }

    async fn profile(&self, user_id: u64) -> Result<UserProfileDto, ApiError> {
        self.with_state(|s| match s.fail_balance {
            Some(failure) => Err(failure.into_error("/users/profile")),
            None => Ok(UserProfileDto {
                id: user_id.to_string(),
                username: Some("tester".to_string()),
                first_name: None,
                balance_stars: s.balance,
                total_cases_opened: s.cases_opened,
                total_spent_stars: 0,
                total_earned_stars: 0,
            }),
        })
    }

    async fn history(&self, _user_id: u64) -> Result<HistoryDto, ApiError> {
        self.with_state(|s| match s.fail_balance {
            Some(failure) => Err(failure.into_error("/users/history")),
            None => {
                let transactions: Vec<TransactionDto> = s
                    .transactions
                    .iter()
                    .rev()
                    .map(|tx| fake_transaction(tx, tx.status.clone()))
                    .collect();
                Ok(HistoryDto {
                    total: transactions.len() as u64,
                    transactions,
                    has_more: false,
                })
            }
        })
    }

    fn forget_user_data(&self) {
        self.with_state(|s| s.forget_calls += 1);
    }
}

fn fake_transaction(tx: &FakeTransaction, status: String) -> TransactionDto {
    TransactionDto {
        id: tx.id.clone(),
        kind: "deposit".to_string(),
        amount: tx.amount as f64,
        currency: "STARS".to_string(),
        status,
        description: None,
        created_at: None,
        completed_at: None,
    }
}

pub fn fake_case() -> CaseDto {
    CaseDto {
        id: "7".to_string(),
        name: "Mystery Box".to_string(),
        description: Some("Crate of wonders".to_string()),
        price_stars: 100,
        image_url: None,
        category: None,
        items: vec![
            fake_item("1", "Gold Coin", "common", 50, Some(45.0)),
            fake_item("2", "Golden Crown", "legendary", 1000, Some(5.0)),
        ],
    }
}

pub fn fake_item(
    id: &str,
    name: &str,
    rarity: &str,
    stars: u64,
    weight: Option<f64>,
) -> CaseItemDto {
    CaseItemDto {
        id: id.to_string(),
        name: name.to_string(),
        value: stars as f64 / 100.0,
        stars,
        rarity: rarity.to_string(),
        weight,
        image: String::new(),
    }
}

/// Services over a `FakeBackend`, with the demo wallet in a temp dir.
pub struct TestContext {
    backend: FakeBackend,
    services: AppServices<FakeBackend, FixedSequence>,
    _dir: TempDir,
}

impl TestContext {
    pub fn new(mode: ForceMode) -> Self {
        Self::with_config(AppConfig {
            force_mode: mode,
            ..Self::base_config()
        })
    }

    /// Retries without backoff and quick payment polling so tests don't wait.
    pub fn base_config() -> AppConfig {
        AppConfig {
            retry: RetryConfig {
                max_attempts: 3,
                base_delay_ms: 0,
                max_delay_ms: 0,
            },
            payment: PaymentConfig {
                poll_interval_ms: 5,
                timeout_ms: 5_000,
            },
            platform_version: Some("7.2".to_string()),
            ..AppConfig::default()
        }
    }

    pub fn with_config(config: AppConfig) -> Self {
        Self::with_rng(config, FixedSequence::constant(0.1))
    }

    pub fn with_rng(config: AppConfig, rng: FixedSequence) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let wallet = DemoWalletStore::open(dir.path().join("demo")).unwrap();
        let backend = FakeBackend::new();
        let services = AppServices::new(backend.clone(), wallet, rng, &config);
        Self {
            backend,
            services,
            _dir: dir,
        }
    }

    pub fn backend(&self) -> &FakeBackend {
        &self.backend
    }

    pub fn services(&self) -> &AppServices<FakeBackend, FixedSequence> {
        &self.services
    }
}
