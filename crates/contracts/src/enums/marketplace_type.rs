use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Типы маркетплейсов
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketplaceType {
    Ozon,
    Wildberries,
    YandexMarket,
}

impl MarketplaceType {
    /// Код маркетплейса (хранится в БД)
    pub fn code(&self) -> &'static str {
        match self {
            MarketplaceType::Ozon => "mp-ozon",
            MarketplaceType::Wildberries => "mp-wb",
            MarketplaceType::YandexMarket => "mp-ym",
        }
    }

    /// Человекочитаемое название
    pub fn display_name(&self) -> &'static str {
        match self {
            MarketplaceType::Ozon => "Ozon",
            MarketplaceType::Wildberries => "Wildberries",
            MarketplaceType::YandexMarket => "Яндекс Маркет",
        }
    }

    pub fn all() -> Vec<MarketplaceType> {
        vec![
            MarketplaceType::Ozon,
            MarketplaceType::Wildberries,
            MarketplaceType::YandexMarket,
        ]
    }

    /// Парсинг из кода
    pub fn from_code(code: &str) -> Option<Self> {
        Self::all().into_iter().find(|mp| mp.code() == code)
    }
}

impl fmt::Display for MarketplaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for MarketplaceType {
    type Err = String;

    /// Принимает как код (`mp-wb`), так и имя варианта (`Wildberries`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(mp) = Self::from_code(s) {
            return Ok(mp);
        }
        match s {
            "Ozon" => Ok(MarketplaceType::Ozon),
            "Wildberries" => Ok(MarketplaceType::Wildberries),
            "YandexMarket" => Ok(MarketplaceType::YandexMarket),
            other => Err(format!("Unknown marketplace: {}", other)),
        }
    }
}
