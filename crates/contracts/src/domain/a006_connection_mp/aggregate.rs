use crate::enums::MarketplaceType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// ID Type
// ============================================================================

/// Уникальный идентификатор подключения к маркетплейсу
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionMPId(pub Uuid);

impl ConnectionMPId {
    pub fn new(value: Uuid) -> Self {
        Self(value)
    }

    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn value(&self) -> Uuid {
        self.0
    }

    pub fn as_string(&self) -> String {
        self.0.to_string()
    }

    pub fn from_string(s: &str) -> Result<Self, String> {
        Uuid::parse_str(s)
            .map(ConnectionMPId::new)
            .map_err(|e| format!("Invalid UUID: {}", e))
    }
}

// ============================================================================
// Aggregate
// ============================================================================

/// Подключение к маркетплейсу (учётная запись продавца на внешней площадке).
///
/// Движок синхронизации читает из него только владельца, тип маркетплейса
/// и учётные данные, которые передаются в клиент площадки.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionMP {
    pub id: ConnectionMPId,
    /// Владелец подключения
    pub user_id: String,
    pub marketplace: MarketplaceType,
    pub description: String,
    pub api_key: String,
    pub supplier_id: Option<String>,
    /// Подключение активно
    pub is_used: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConnectionMP {
    pub fn new_for_insert(
        user_id: String,
        marketplace: MarketplaceType,
        description: String,
        api_key: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ConnectionMPId::new_v4(),
            user_id,
            marketplace,
            description,
            api_key,
            supplier_id: None,
            is_used: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn to_string_id(&self) -> String {
        self.id.as_string()
    }

    /// Валидация данных
    pub fn validate(&self) -> Result<(), String> {
        if self.description.trim().is_empty() {
            return Err("Наименование не может быть пустым".into());
        }
        if self.api_key.trim().is_empty() {
            return Err("API Key не может быть пустым".into());
        }
        if self.user_id.trim().is_empty() {
            return Err("Владелец подключения должен быть указан".into());
        }
        Ok(())
    }
}
