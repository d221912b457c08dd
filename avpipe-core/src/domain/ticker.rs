//! Tickers and company overview data.

use super::TickerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tracked symbol. `symbol` is unique and always uppercase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub id: TickerId,
    pub symbol: String,
    pub name: Option<String>,
    pub source: String,
    pub created_at: DateTime<Utc>,
}

/// Stored company information, one row per ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyInfo {
    pub ticker_id: TickerId,
    pub name: Option<String>,
    pub sector: Option<String>,
    pub market_cap: Option<f64>,
}

/// Company fields extracted from a provider overview payload.
///
/// Every field is optional: the provider omits fields, sends empty strings,
/// or sends the literal `"None"` for unknown values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyOverview {
    pub name: Option<String>,
    pub sector: Option<String>,
    pub market_cap: Option<f64>,
}

impl CompanyInfo {
    /// Merge a fresh overview into this record.
    ///
    /// Fields present in the overview replace stored ones; absent fields leave
    /// the stored value untouched.
    pub fn merge(&mut self, overview: &CompanyOverview) {
        if let Some(name) = &overview.name {
            self.name = Some(name.clone());
        }
        if let Some(sector) = &overview.sector {
            self.sector = Some(sector.clone());
        }
        if let Some(cap) = overview.market_cap {
            self.market_cap = Some(cap);
        }
    }

    /// A new record built from an overview.
    pub fn from_overview(ticker_id: TickerId, overview: &CompanyOverview) -> Self {
        Self {
            ticker_id,
            name: overview.name.clone(),
            sector: overview.sector.clone(),
            market_cap: overview.market_cap,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored() -> CompanyInfo {
        CompanyInfo {
            ticker_id: 1,
            name: Some("Apple Inc".into()),
            sector: Some("TECHNOLOGY".into()),
            market_cap: Some(3.0e12),
        }
    }

    #[test]
    fn merge_keeps_fields_missing_from_overview() {
        let mut info = stored();
        info.merge(&CompanyOverview {
            name: None,
            sector: Some("INFORMATION TECHNOLOGY".into()),
            market_cap: None,
        });
        assert_eq!(info.name.as_deref(), Some("Apple Inc"));
        assert_eq!(info.sector.as_deref(), Some("INFORMATION TECHNOLOGY"));
        assert_eq!(info.market_cap, Some(3.0e12));
    }

    #[test]
    fn merge_replaces_market_cap_when_present() {
        let mut info = stored();
        info.merge(&CompanyOverview {
            market_cap: Some(3.5e12),
            ..Default::default()
        });
        assert_eq!(info.market_cap, Some(3.5e12));
    }
}
