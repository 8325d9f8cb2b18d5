use demo_store::{
    LedgerEntry,
    StoredItem,
    WalletRecord,
};
use lootcase_api::dto::{
    HistoryDto,
    InventoryItemDto,
    SellItemResponseDto,
    TransactionDto,
    UserProfileDto,
};
use serde::Serialize;

/// An item the user owns, on the backend or in the demo wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryItem {
    /// Id to pass to `sell_item`.
    pub id: String,
    pub name: String,
    pub rarity: String,
    pub value_stars: u64,
    pub case_name: Option<String>,
    pub acquired_at: Option<String>,
}

impl From<InventoryItemDto> for InventoryItem {
    fn from(dto: InventoryItemDto) -> Self {
        Self {
            id: dto.id,
            name: dto.item_name,
            rarity: dto.rarity,
            value_stars: dto.item_stars,
            case_name: dto.case_name,
            acquired_at: dto.created_at,
        }
    }
}

impl From<StoredItem> for InventoryItem {
    fn from(item: StoredItem) -> Self {
        Self {
            id: item.entry_id,
            name: item.name,
            rarity: item.rarity,
            value_stars: item.value_stars,
            case_name: Some(item.case_id),
            acquired_at: Some(item.won_at),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemSale {
    pub item_id: String,
    pub stars_earned: u64,
    pub new_balance: u64,
}

impl ItemSale {
    pub fn from_response(item_id: &str, dto: SellItemResponseDto) -> Self {
        Self {
            item_id: item_id.to_string(),
            stars_earned: dto.stars_earned,
            new_balance: dto.new_balance,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub display_name: Option<String>,
    pub balance_stars: u64,
    pub total_cases_opened: u64,
    pub total_spent_stars: u64,
    pub total_earned_stars: u64,
}

impl From<UserProfileDto> for UserProfile {
    fn from(dto: UserProfileDto) -> Self {
        Self {
            display_name: dto.first_name.or(dto.username),
            balance_stars: dto.balance_stars,
            total_cases_opened: dto.total_cases_opened,
            total_spent_stars: dto.total_spent_stars,
            total_earned_stars: dto.total_earned_stars,
        }
    }
}

impl From<&WalletRecord> for UserProfile {
    fn from(record: &WalletRecord) -> Self {
        Self {
            display_name: None,
            balance_stars: record.balance_stars,
            total_cases_opened: record.total_cases_opened,
            total_spent_stars: record.total_spent_stars,
            total_earned_stars: record.total_earned_stars,
        }
    }
}

/// One line of the operation history, newest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub kind: String,
    pub amount: f64,
    pub currency: String,
    pub status: String,
    pub description: Option<String>,
    pub at: Option<String>,
}

impl From<TransactionDto> for HistoryEntry {
    fn from(dto: TransactionDto) -> Self {
        Self {
            kind: dto.kind,
            amount: dto.amount,
            currency: dto.currency,
            status: dto.status,
            description: dto.description,
            at: dto.created_at,
        }
    }
}

impl From<LedgerEntry> for HistoryEntry {
    fn from(entry: LedgerEntry) -> Self {
        Self {
            kind: entry.kind.as_str().to_string(),
            amount: entry.amount_stars as f64,
            currency: "STARS".to_string(),
            status: "completed".to_string(),
            description: Some(entry.description),
            at: Some(entry.at),
        }
    }
}

pub fn history_from_dto(dto: HistoryDto) -> Vec<HistoryEntry> {
    dto.transactions.into_iter().map(HistoryEntry::from).collect()
}

/// Demo ledger in history order.
pub fn history_from_ledger(ledger: Vec<LedgerEntry>) -> Vec<HistoryEntry> {
    ledger.into_iter().rev().map(HistoryEntry::from).collect()
}
