use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Прогресс задачи. Пишется только воркером-владельцем и всегда целиком.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFetchProgress {
    /// Номер последнего обработанного месяца (1-based)
    pub current_month: u32,
    pub total_months: TotalMonths,
    pub orders_processed: u64,
    /// Ошибки отдельных месяцев; список только растёт
    #[serde(default)]
    pub errors: Vec<PeriodError>,
    pub last_processed_date: Option<DateTime<Utc>>,
}

impl OrderFetchProgress {
    pub fn new(total_months: TotalMonths) -> Self {
        Self {
            current_month: 0,
            total_months,
            orders_processed: 0,
            errors: Vec::new(),
            last_processed_date: None,
        }
    }
}

/// Ошибка выгрузки одного месячного окна
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodError {
    pub month: u32,
    /// Начало окна, на котором произошла ошибка
    pub date: DateTime<Utc>,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

/// Общее количество месяцев: число или `"unknown"` для режима auto
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TotalMonths {
    Known(u32),
    Unknown,
}

const UNKNOWN: &str = "unknown";

impl Serialize for TotalMonths {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TotalMonths::Known(months) => serializer.serialize_u32(*months),
            TotalMonths::Unknown => serializer.serialize_str(UNKNOWN),
        }
    }
}

impl<'de> Deserialize<'de> for TotalMonths {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u32),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(months) => Ok(TotalMonths::Known(months)),
            Raw::Text(s) if s == UNKNOWN => Ok(TotalMonths::Unknown),
            Raw::Text(s) => Err(serde::de::Error::custom(format!(
                "expected a month count or \"{}\", got \"{}\"",
                UNKNOWN, s
            ))),
        }
    }
}
