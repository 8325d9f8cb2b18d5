use anyhow::{
    Context,
    Result,
    anyhow,
};
use chrono::Utc;
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fmt,
    fs,
    path::{
        Path,
        PathBuf,
    },
    sync::Mutex,
};

pub const DEMO_ROOT: &str = ".lootcase/demo";
const WALLET_FILE: &str = "wallet.json";

/// Prefix of every demo inventory entry id.
pub const ENTRY_PREFIX: &str = "demo-";

/// Stars a fresh demo wallet starts with.
pub const STARTING_BALANCE: u64 = 1000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredItem {
    /// Unique within the wallet, assigned by `record_opening`.
    #[serde(default)]
    pub entry_id: String,
    pub item_id: String,
    pub name: String,
    pub rarity: String,
    pub value_stars: u64,
    pub case_id: String,
    pub won_at: String,
}

impl StoredItem {
    pub fn new(
        item_id: impl Into<String>,
        name: impl Into<String>,
        rarity: impl Into<String>,
        value_stars: u64,
        case_id: impl Into<String>,
    ) -> Self {
        Self {
            entry_id: String::new(),
            item_id: item_id.into(),
            name: name.into(),
            rarity: rarity.into(),
            value_stars,
            case_id: case_id.into(),
            won_at: Utc::now().to_rfc3339(),
        }
    }
}

/// One balance movement in the demo wallet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub kind: LedgerKind,
    pub amount_stars: u64,
    pub description: String,
    pub at: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerKind {
    CaseOpening,
    Deposit,
    ItemSale,
}

impl LedgerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LedgerKind::CaseOpening => "case_opening",
            LedgerKind::Deposit => "deposit",
            LedgerKind::ItemSale => "item_sale",
        }
    }
}

impl LedgerEntry {
    fn now(kind: LedgerKind, amount_stars: u64, description: String) -> Self {
        Self {
            kind,
            amount_stars,
            description,
            at: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletRecord {
    pub balance_stars: u64,
    #[serde(default)]
    pub inventory: Vec<StoredItem>,
    #[serde(default)]
    pub total_cases_opened: u64,
    #[serde(default)]
    pub total_spent_stars: u64,
    #[serde(default)]
    pub total_deposited_stars: u64,
    #[serde(default)]
    pub total_earned_stars: u64,
    #[serde(default)]
    pub ledger: Vec<LedgerEntry>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl Default for WalletRecord {
    fn default() -> Self {
        Self {
            balance_stars: STARTING_BALANCE,
            inventory: Vec::new(),
            total_cases_opened: 0,
            total_spent_stars: 0,
            total_deposited_stars: 0,
            total_earned_stars: 0,
            ledger: Vec::new(),
            updated_at: None,
        }
    }
}

/// Returned (inside `anyhow::Error`) when the demo balance cannot cover a price.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InsufficientBalance {
    pub balance: u64,
    pub price: u64,
}

impl fmt::Display for InsufficientBalance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "insufficient demo balance: {} stars available, {} required",
            self.balance, self.price
        )
    }
}

impl std::error::Error for InsufficientBalance {}

/// Returned (inside `anyhow::Error`) when no stored item has the given entry id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemNotFound(pub String);

impl fmt::Display for ItemNotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no demo item '{}' in the inventory", self.0)
    }
}

impl std::error::Error for ItemNotFound {}

/// Demo wallet persisted as a single JSON document.
#[derive(Debug)]
pub struct DemoWalletStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl DemoWalletStore {
    /// Opens the store under `dir`, creating the directory and file if needed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let path = ensure_store(dir.as_ref())?;
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn open_default() -> Result<Self> {
        Self::open(DEMO_ROOT)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<WalletRecord> {
        read_record(&self.path)
    }

    pub fn save(&self, record: &WalletRecord) -> Result<()> {
        let _guard = self.lock()?;
        write_record(&self.path, record)
    }

    pub fn balance(&self) -> Result<u64> {
        Ok(self.load()?.balance_stars)
    }

    pub fn inventory(&self) -> Result<Vec<StoredItem>> {
        Ok(self.load()?.inventory)
    }

    /// Read-modify-write under the store lock. Nothing is written if `f` fails.
    pub fn update<T>(&self, f: impl FnOnce(&mut WalletRecord) -> Result<T>) -> Result<T> {
        let _guard = self.lock()?;
        let mut record = read_record(&self.path)?;
        let out = f(&mut record)?;
        record.updated_at = Some(Utc::now().to_rfc3339());
        write_record(&self.path, &record)?;
        Ok(out)
    }

    pub fn ledger(&self) -> Result<Vec<LedgerEntry>> {
        Ok(self.load()?.ledger)
    }

    /// Debits `price` and stores the won item. Returns the new balance.
    pub fn record_opening(&self, price: u64, mut item: StoredItem) -> Result<u64> {
        self.update(|record| {
            if record.balance_stars < price {
                return Err(InsufficientBalance {
                    balance: record.balance_stars,
                    price,
                }
                .into());
            }
            record.balance_stars -= price;
            record.total_spent_stars = record.total_spent_stars.saturating_add(price);
            record.total_cases_opened += 1;
            item.entry_id = format!("{ENTRY_PREFIX}{}", record.total_cases_opened);
            tracing::debug!(item = %item.name, price, "demo opening recorded");
            record.ledger.push(LedgerEntry::now(
                LedgerKind::CaseOpening,
                price,
                format!("Opened {}", item.case_id),
            ));
            record.inventory.push(item);
            Ok(record.balance_stars)
        })
    }

    /// Adds stars to the demo balance. Returns the new balance.
    pub fn credit(&self, amount: u64) -> Result<u64> {
        self.update(|record| {
            record.balance_stars = record
                .balance_stars
                .checked_add(amount)
                .ok_or_else(|| anyhow!("demo balance overflow"))?;
            record.total_deposited_stars =
                record.total_deposited_stars.saturating_add(amount);
            record.ledger.push(LedgerEntry::now(
                LedgerKind::Deposit,
                amount,
                "Demo deposit".to_string(),
            ));
            Ok(record.balance_stars)
        })
    }

    /// Removes the item and credits its value. Returns the sold item and the
    /// new balance.
    pub fn sell(&self, entry_id: &str) -> Result<(StoredItem, u64)> {
        self.update(|record| {
            let position = record
                .inventory
                .iter()
                .position(|item| item.entry_id == entry_id)
                .ok_or_else(|| ItemNotFound(entry_id.to_string()))?;
            let value = record.inventory[position].value_stars;
            record.balance_stars = record
                .balance_stars
                .checked_add(value)
                .ok_or_else(|| anyhow!("demo balance overflow"))?;
            let item = record.inventory.remove(position);
            record.total_earned_stars = record.total_earned_stars.saturating_add(value);
            record.ledger.push(LedgerEntry::now(
                LedgerKind::ItemSale,
                value,
                format!("Sold {}", item.name),
            ));
            Ok((item, record.balance_stars))
        })
    }

    pub fn reset(&self) -> Result<()> {
        self.save(&WalletRecord::default())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| anyhow!("demo wallet lock poisoned"))
    }
}

fn ensure_store(dir: &Path) -> Result<PathBuf> {
    if !dir.exists() {
        fs::create_dir_all(dir).with_context(|| {
            format!("Failed to create demo wallet directory {}", dir.display())
        })?;
    }

    let file_path = dir.join(WALLET_FILE);
    if !file_path.exists() {
        fs::write(&file_path, b"").with_context(|| {
            format!("Failed to create demo wallet file at {:?}", file_path)
        })?;
    }

    Ok(file_path)
}

fn read_record(path: impl AsRef<Path>) -> Result<WalletRecord> {
    let data = fs::read(path.as_ref()).context("Failed to read demo wallet")?;
    if data.iter().all(u8::is_ascii_whitespace) {
        return Ok(WalletRecord::default());
    }
    serde_json::from_slice::<WalletRecord>(&data)
        .context("Failed to parse demo wallet JSON")
}

fn write_record(path: impl AsRef<Path>, record: &WalletRecord) -> Result<()> {
    let json =
        serde_json::to_vec_pretty(record).context("Failed to serialize demo wallet")?;
    fs::write(path.as_ref(), json).context("Failed to write demo wallet")?;
    Ok(())
}
