use serde::{
    Deserialize,
    Deserializer,
    Serialize,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseItemDto {
    #[serde(deserialize_with = "id_from_number_or_string")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub stars: u64,
    #[serde(default)]
    pub rarity: String,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseDto {
    #[serde(deserialize_with = "id_from_number_or_string")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price_stars: u64,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub items: Vec<CaseItemDto>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItemDto {
    #[serde(deserialize_with = "id_from_number_or_string")]
    pub id: String,
    pub item_name: String,
    #[serde(default)]
    pub item_stars: u64,
    #[serde(default)]
    pub rarity: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub case_name: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenCaseResponseDto {
    pub success: bool,
    #[serde(default)]
    pub item: Option<InventoryItemDto>,
    pub new_balance: u64,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceDto {
    pub balance_stars: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StarsInvoiceDto {
    pub invoice_link: String,
    #[serde(deserialize_with = "id_from_number_or_string")]
    pub transaction_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellItemResponseDto {
    pub success: bool,
    #[serde(default)]
    pub stars_earned: u64,
    pub new_balance: u64,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionDto {
    #[serde(deserialize_with = "id_from_number_or_string")]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(deserialize_with = "amount_from_number_or_string")]
    pub amount: f64,
    #[serde(default)]
    pub currency: String,
    pub status: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryDto {
    #[serde(default)]
    pub transactions: Vec<TransactionDto>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfileDto {
    #[serde(deserialize_with = "id_from_number_or_string")]
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub balance_stars: u64,
    #[serde(default)]
    pub total_cases_opened: u64,
    #[serde(default)]
    pub total_spent_stars: u64,
    #[serde(default)]
    pub total_earned_stars: u64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub(crate) struct OpenCaseRequest {
    pub user_id: u64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub(crate) struct SellItemRequest {
    pub user_id: u64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub(crate) struct StarsInvoiceRequest {
    pub user_id: u64,
    pub stars_amount: u64,
}

fn id_from_number_or_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(u64),
        Text(String),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Number(n) => n.to_string(),
        RawId::Text(s) => s,
    })
}

// Decimal columns come back as JSON strings.
fn amount_from_number_or_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawAmount {
        Number(f64),
        Text(String),
    }

    match RawAmount::deserialize(deserializer)? {
        RawAmount::Number(n) => Ok(n),
        RawAmount::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
