use lootcase_api::dto::{
    CaseDto,
    CaseItemDto,
    InventoryItemDto,
};
use lootcase_core::Weighted;
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fmt,
    str::FromStr,
};
use thiserror::Error;

pub const DEMO_MYSTERY_BOX: &str = "demo_mystery_box";

/// Drop weight for items whose rarity label is not recognised.
pub const UNKNOWN_RARITY_WEIGHT: f64 = 30.0;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Rare,
    Epic,
    Legendary,
    Mythic,
}

impl Rarity {
    pub const ALL: [Rarity; 5] = [
        Rarity::Common,
        Rarity::Rare,
        Rarity::Epic,
        Rarity::Legendary,
        Rarity::Mythic,
    ];

    /// Weight used when an item does not carry its own.
    pub fn default_weight(self) -> f64 {
        match self {
            Rarity::Common => 50.0,
            Rarity::Rare => 25.0,
            Rarity::Epic => 15.0,
            Rarity::Legendary => 8.0,
            Rarity::Mythic => 2.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Rarity::Common => "common",
            Rarity::Rare => "rare",
            Rarity::Epic => "epic",
            Rarity::Legendary => "legendary",
            Rarity::Mythic => "mythic",
        }
    }

    /// Legendary and mythic drops get the big celebration.
    pub fn is_rare_drop(self) -> bool {
        matches!(self, Rarity::Legendary | Rarity::Mythic)
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown rarity '{0}'")]
pub struct UnknownRarity(pub String);

impl FromStr for Rarity {
    type Err = UnknownRarity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "common" => Ok(Rarity::Common),
            "rare" => Ok(Rarity::Rare),
            "epic" => Ok(Rarity::Epic),
            "legendary" => Ok(Rarity::Legendary),
            "mythic" => Ok(Rarity::Mythic),
            _ => Err(UnknownRarity(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseItem {
    pub id: String,
    pub name: String,
    /// `None` when the backend sent a label we do not know.
    pub rarity: Option<Rarity>,
    pub value_stars: u64,
    pub weight: f64,
    pub image: String,
}

impl CaseItem {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        rarity: Rarity,
        value_stars: u64,
        weight: f64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            rarity: Some(rarity),
            value_stars,
            weight,
            image: String::new(),
        }
    }

    /// Item whose weight comes from its rarity tier.
    pub fn with_rarity_weight(
        id: impl Into<String>,
        name: impl Into<String>,
        rarity: Rarity,
        value_stars: u64,
    ) -> Self {
        Self::new(id, name, rarity, value_stars, rarity.default_weight())
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    pub fn rarity_label(&self) -> &'static str {
        self.rarity.map(Rarity::as_str).unwrap_or("unknown")
    }
}

impl Weighted for CaseItem {
    fn weight(&self) -> f64 {
        self.weight
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price_stars: u64,
    pub image: String,
    pub items: Vec<CaseItem>,
}

impl Case {
    pub fn item_by_name(&self, name: &str) -> Option<&CaseItem> {
        self.items.iter().find(|item| item.name == name)
    }

    pub fn can_afford(&self, balance: u64) -> bool {
        balance >= self.price_stars
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseOpening {
    /// The case as it was opened, reusable for the spin animation.
    pub case: Case,
    pub item: CaseItem,
    pub new_balance: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidCase {
    #[error("case '{0}' has no items")]
    NoItems(String),
}

fn parse_rarity(raw: &str) -> Option<Rarity> {
    match raw.parse() {
        Ok(rarity) => Some(rarity),
        Err(err) => {
            tracing::debug!(%err, "treating rarity as unknown");
            None
        }
    }
}

impl From<CaseItemDto> for CaseItem {
    fn from(dto: CaseItemDto) -> Self {
        let rarity = parse_rarity(&dto.rarity);
        // the backend treats non-positive weights as 1
        let weight = match dto.weight {
            Some(weight) if weight > 0.0 && weight.is_finite() => weight,
            Some(_) => 1.0,
            None => rarity
                .map(Rarity::default_weight)
                .unwrap_or(UNKNOWN_RARITY_WEIGHT),
        };
        Self {
            id: dto.id,
            name: dto.name,
            rarity,
            value_stars: dto.stars,
            weight,
            image: dto.image,
        }
    }
}

impl Case {
    /// Case list entries may come without their items.
    pub fn from_summary(dto: CaseDto) -> Self {
        Self {
            id: dto.id,
            name: dto.name,
            description: dto.description.unwrap_or_default(),
            price_stars: dto.price_stars,
            image: dto.image_url.unwrap_or_default(),
            items: dto.items.into_iter().map(CaseItem::from).collect(),
        }
    }
}

impl TryFrom<CaseDto> for Case {
    type Error = InvalidCase;

    fn try_from(dto: CaseDto) -> Result<Self, Self::Error> {
        if dto.items.is_empty() {
            return Err(InvalidCase::NoItems(dto.id));
        }
        Ok(Self::from_summary(dto))
    }
}

/// Item the backend says was won, matched against the case contents by name.
pub fn won_item(case: &Case, dto: InventoryItemDto) -> CaseItem {
    if let Some(item) = case.item_by_name(&dto.item_name) {
        return item.clone();
    }
    let rarity = parse_rarity(&dto.rarity);
    CaseItem {
        id: dto.id,
        name: dto.item_name,
        rarity,
        value_stars: dto.item_stars,
        weight: rarity
            .map(Rarity::default_weight)
            .unwrap_or(UNKNOWN_RARITY_WEIGHT),
        image: dto.image_url.unwrap_or_default(),
    }
}

/// Cases available without a backend.
#[derive(Debug, Clone)]
pub struct DemoCatalogue {
    cases: Vec<Case>,
}

impl Default for DemoCatalogue {
    fn default() -> Self {
        Self::new(vec![
            Case {
                id: DEMO_MYSTERY_BOX.to_string(),
                name: "Mystery Box".to_string(),
                description: "A mysterious box full of surprising prizes".to_string(),
                price_stars: 100,
                image: "assets/images/cases/mystery_box.png".to_string(),
                items: vec![
                    CaseItem::new("gold_coin", "Gold Coin", Rarity::Common, 50, 45.0)
                        .with_image("assets/images/items/gold_coin.png"),
                    CaseItem::new("silver_coin", "Silver Coin", Rarity::Rare, 100, 30.0)
                        .with_image("assets/images/items/silver_coin.png"),
                    CaseItem::new("diamond", "Diamond", Rarity::Epic, 300, 20.0)
                        .with_image("assets/images/items/diamond.png"),
                    CaseItem::new("golden_crown", "Golden Crown", Rarity::Legendary, 1000, 5.0)
                        .with_image("assets/images/items/crown.png"),
                ],
            },
            Case {
                id: "demo_treasure_chest".to_string(),
                name: "Treasure Chest".to_string(),
                description: "A chest of pirate treasure".to_string(),
                price_stars: 250,
                image: "assets/images/cases/treasure_chest.png".to_string(),
                items: vec![
                    CaseItem::with_rarity_weight("silver_coin", "Silver Coin", Rarity::Common, 100),
                    CaseItem::with_rarity_weight("ruby", "Ruby", Rarity::Rare, 300),
                    CaseItem::with_rarity_weight("diamond", "Diamond", Rarity::Epic, 600),
                    CaseItem::with_rarity_weight("golden_crown", "Golden Crown", Rarity::Legendary, 1500),
                ],
            },
            Case {
                id: "demo_royal_case".to_string(),
                name: "Royal Case".to_string(),
                description: "A royal case with rare prizes".to_string(),
                price_stars: 500,
                image: "assets/images/cases/royal_case.png".to_string(),
                items: vec![
                    CaseItem::with_rarity_weight("ruby", "Ruby", Rarity::Common, 300),
                    CaseItem::with_rarity_weight("sapphire", "Sapphire", Rarity::Rare, 600),
                    CaseItem::with_rarity_weight("royal_sceptre", "Royal Sceptre", Rarity::Epic, 1200),
                    CaseItem::with_rarity_weight("golden_crown", "Golden Crown", Rarity::Legendary, 2500),
                    CaseItem::with_rarity_weight("dragon_egg", "Dragon Egg", Rarity::Mythic, 6000),
                ],
            },
            Case {
                id: "demo_legendary_vault".to_string(),
                name: "Legendary Vault".to_string(),
                description: "A legendary vault".to_string(),
                price_stars: 1000,
                image: "assets/images/cases/legendary_vault.png".to_string(),
                items: vec![
                    CaseItem::with_rarity_weight("sapphire", "Sapphire", Rarity::Rare, 600),
                    CaseItem::with_rarity_weight("royal_sceptre", "Royal Sceptre", Rarity::Epic, 1500),
                    CaseItem::with_rarity_weight("golden_crown", "Golden Crown", Rarity::Legendary, 3000),
                    CaseItem::with_rarity_weight("dragon_egg", "Dragon Egg", Rarity::Mythic, 10000),
                ],
            },
        ])
    }
}

impl DemoCatalogue {
    pub fn new(cases: Vec<Case>) -> Self {
        Self { cases }
    }

    pub fn cases(&self) -> &[Case] {
        &self.cases
    }

    pub fn case(&self, case_id: &str) -> Option<&Case> {
        self.cases.iter().find(|case| case.id == case_id)
    }

    /// Unknown ids get the first case (the mystery box by default).
    pub fn case_or_default(&self, case_id: &str) -> Option<&Case> {
        self.case(case_id).or_else(|| self.cases.first())
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    fn item_dto(rarity: &str, weight: Option<f64>) -> CaseItemDto {
        CaseItemDto {
            id: "1".to_string(),
            name: "Gold Coin".to_string(),
            value: 0.5,
            stars: 50,
            rarity: rarity.to_string(),
            weight,
            image: String::new(),
        }
    }

    #[test]
    fn rarity__parses_case_insensitively() {
        assert_eq!("LEGENDARY".parse::<Rarity>().unwrap(), Rarity::Legendary);
        assert_eq!(" mythic".parse::<Rarity>().unwrap(), Rarity::Mythic);
        assert!("shiny".parse::<Rarity>().is_err());
    }

    #[test]
    fn case_item_from_dto__weight_falls_back_to_rarity_then_unknown() {
        assert_eq!(CaseItem::from(item_dto("epic", Some(12.0))).weight, 12.0);
        assert_eq!(CaseItem::from(item_dto("epic", None)).weight, 15.0);
        assert_eq!(
            CaseItem::from(item_dto("shiny", None)).weight,
            UNKNOWN_RARITY_WEIGHT
        );
    }

    #[test]
    fn case_item_from_dto__non_positive_weight_becomes_one() {
        assert_eq!(CaseItem::from(item_dto("rare", Some(0.0))).weight, 1.0);
        assert_eq!(CaseItem::from(item_dto("rare", Some(-3.0))).weight, 1.0);
    }

    #[test]
    fn case_try_from__empty_item_list_is_invalid() {
        let dto = CaseDto {
            id: "9".to_string(),
            name: "Empty".to_string(),
            description: None,
            price_stars: 10,
            image_url: None,
            category: None,
            items: Vec::new(),
        };

        assert_eq!(
            Case::try_from(dto),
            Err(InvalidCase::NoItems("9".to_string()))
        );
    }

    #[test]
    fn won_item__prefers_the_case_entry_with_the_same_name() {
        // given
        let catalogue = DemoCatalogue::default();
        let case = catalogue.case(DEMO_MYSTERY_BOX).unwrap();
        let dto = InventoryItemDto {
            id: "900".to_string(),
            item_name: "Diamond".to_string(),
            item_stars: 300,
            rarity: "epic".to_string(),
            image_url: None,
            case_name: None,
            created_at: None,
        };

        // when
        let item = won_item(case, dto);

        // then
        assert_eq!(item.id, "diamond");
        assert_eq!(item.weight, 20.0);
    }

    #[test]
    fn demo_catalogue__unknown_id_gets_mystery_box() {
        let catalogue = DemoCatalogue::default();

        let case = catalogue.case_or_default("no_such_case").unwrap();

        assert_eq!(case.id, DEMO_MYSTERY_BOX);
        assert_eq!(case.price_stars, 100);
        let weights: Vec<f64> = case.items.iter().map(|i| i.weight).collect();
        assert_eq!(weights, vec![45.0, 30.0, 20.0, 5.0]);
    }
}
