//! Per-locale seed channels, discovery queries and currency markers.
//!
//! The catalog is read-only process configuration: the built-in table is
//! created once on first use, and a replacement can be loaded once at startup
//! with [`LocaleCatalog::from_profiles`].

use std::collections::BTreeMap;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::relevance::{FilterError, PricePatternFilter};
use crate::Handle;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocaleProfile {
    pub code: String,
    #[serde(default)]
    pub seeds: Vec<Handle>,
    #[serde(default)]
    pub queries: Vec<String>,
    #[serde(default)]
    pub currencies: Vec<String>,
}

impl LocaleProfile {
    /// Relevance filter tuned to this locale's currencies.
    pub fn relevance_filter(&self) -> Result<PricePatternFilter, FilterError> {
        if self.currencies.is_empty() {
            return Ok(PricePatternFilter::default());
        }
        PricePatternFilter::new(&self.currencies)
    }
}

/// On-disk shape of a catalog override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogFile {
    pub locales: Vec<LocaleProfile>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("unknown locale {code:?}; available: {}", available.join(", "))]
    UnknownLocale { code: String, available: Vec<String> },
    #[error("locale {0:?} has no seed channels")]
    NoSeeds(String),
    #[error("locale {0:?} has no discovery queries")]
    NoQueries(String),
    #[error("locale {0:?} is defined more than once")]
    Duplicate(String),
    #[error("locale code is empty")]
    EmptyCode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleCatalog {
    locales: BTreeMap<String, LocaleProfile>,
}

impl LocaleCatalog {
    pub fn from_profiles(profiles: Vec<LocaleProfile>) -> Result<Self, CatalogError> {
        let mut locales = BTreeMap::new();
        for mut profile in profiles {
            let code = profile.code.trim().to_ascii_lowercase();
            if code.is_empty() {
                return Err(CatalogError::EmptyCode);
            }
            profile.code = code.clone();
            if locales.insert(code.clone(), profile).is_some() {
                return Err(CatalogError::Duplicate(code));
            }
        }
        Ok(Self { locales })
    }

    pub fn builtin() -> &'static LocaleCatalog {
        &BUILTIN
    }

    pub fn get(&self, code: &str) -> Result<&LocaleProfile, CatalogError> {
        let key = code.trim().to_ascii_lowercase();
        self.locales
            .get(&key)
            .ok_or_else(|| CatalogError::UnknownLocale {
                code: code.to_string(),
                available: self.codes(),
            })
    }

    pub fn seeds(&self, code: &str) -> Result<&[Handle], CatalogError> {
        let profile = self.get(code)?;
        if profile.seeds.is_empty() {
            return Err(CatalogError::NoSeeds(profile.code.clone()));
        }
        Ok(&profile.seeds)
    }

    pub fn queries(&self, code: &str) -> Result<&[String], CatalogError> {
        let profile = self.get(code)?;
        if profile.queries.is_empty() {
            return Err(CatalogError::NoQueries(profile.code.clone()));
        }
        Ok(&profile.queries)
    }

    pub fn codes(&self) -> Vec<String> {
        self.locales.keys().cloned().collect()
    }
}

static BUILTIN: LazyLock<LocaleCatalog> = LazyLock::new(|| {
    LocaleCatalog::from_profiles(vec![
        profile(
            "kg",
            &[
                "Kvartira_BishkekKg",
                "Bishkek_kvartira_chaty",
                "BishkekHouse24",
                "bishkekarendakv",
                "bishkek_Nedvijimost",
                "bishkek1arenda",
                "arendabishkek312kg",
                "tabyshmak_ru",
                "kyrgyzstan_oshtyk",
            ],
            &[
                "#недвижимость",
                "#квартира",
                "#аренда",
                "сдается квартира Бишкек",
                "продается квартира Бишкек",
                "аренда Ош",
                "квартира Джалал-Абад",
            ],
            &["сом", "som", "KGS", "$", "USD"],
        ),
        profile(
            "uz",
            &[
                "arentash",
                "rent_v_tashkente",
                "mnogo_nedvijimosti_Tashkent",
                "kvartiri_doma_tashkenta",
                "uylar_estate",
            ],
            &[
                "#kvartira",
                "#tashkent",
                "#arenda",
                "#nedvijimost",
                "квартира Ташкент",
                "аренда Самарканд",
                "продается Бухара",
            ],
            &["сум", "sum", "UZS", "$", "USD"],
        ),
        profile(
            "az",
            &[
                "baku_obyavlenia",
                "bakutinarieltor",
                "nedvijimost_baku",
                "baku_kvartiri",
                "invest_in_baku",
            ],
            &[
                "#baki",
                "#menzil",
                "#kiraye",
                "#satilir",
                "kirayə mənzil Bakı",
                "satılır ev Bakı",
            ],
            &["манат", "AZN", "$", "USD"],
        ),
        profile(
            "ge",
            &[],
            &[
                "#tbilisi",
                "#apartment",
                "#rent",
                "ქირავდება ბინა",
                "იყიდება ბინა თბილისი",
            ],
            &["лари", "GEL", "$", "USD"],
        ),
    ])
    .expect("built-in locale codes are unique")
});

fn profile(code: &str, seeds: &[&str], queries: &[&str], currencies: &[&str]) -> LocaleProfile {
    LocaleProfile {
        code: code.to_string(),
        seeds: seeds
            .iter()
            .map(|s| Handle::parse(s).expect("built-in seed handles are valid"))
            .collect(),
        queries: queries.iter().map(|q| q.to_string()).collect(),
        currencies: currencies.iter().map(|c| c.to_string()).collect(),
    }
}
