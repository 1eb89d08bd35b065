use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};

use super::{CatalogError, CatalogSource};
use crate::workflows::quotation::domain::{
    CatalogOption, ClientCategory, CopayOption, CoverageFamily, PlanCoverageRecord,
};

#[derive(Debug, thiserror::Error)]
pub enum CatalogImportError {
    #[error("failed to read catalog export: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid catalog CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("catalog row {row}: {reason}")]
    InvalidRow { row: usize, reason: String },
}

/// In-memory catalog source, usually loaded from a CSV export with the columns
/// `kind,family,plan_type_id,category,plan_name,id,description,price,percentage_covered`.
///
/// `kind` is `coverage`, `copay` or `plan`. Families can be marked unavailable to mimic an
/// upstream outage.
#[derive(Debug, Clone, Default)]
pub struct CatalogTable {
    options: BTreeMap<(CoverageFamily, u32), Vec<CatalogOption>>,
    copays: BTreeMap<(CoverageFamily, ClientCategory), Vec<CopayOption>>,
    plan_records: BTreeMap<(String, u32, ClientCategory), Vec<PlanCoverageRecord>>,
    unavailable: BTreeSet<CoverageFamily>,
}

impl CatalogTable {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, CatalogImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, CatalogImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut table = Self::default();

        for (index, record) in csv_reader.deserialize::<CatalogRow>().enumerate() {
            let row = record?;
            // header is line 1
            table.apply_row(row, index + 2)?;
        }

        Ok(table)
    }

    pub fn with_option(
        mut self,
        family: CoverageFamily,
        plan_type_id: u32,
        option: CatalogOption,
    ) -> Self {
        self.options
            .entry((family, plan_type_id))
            .or_default()
            .push(option);
        self
    }

    pub fn with_copay(
        mut self,
        family: CoverageFamily,
        category: ClientCategory,
        copay: CopayOption,
    ) -> Self {
        self.copays.entry((family, category)).or_default().push(copay);
        self
    }

    pub fn with_plan_record(
        mut self,
        plan_name: &str,
        plan_type_id: u32,
        category: ClientCategory,
        record: PlanCoverageRecord,
    ) -> Self {
        self.plan_records
            .entry((normalize_plan_name(plan_name), plan_type_id, category))
            .or_default()
            .push(record);
        self
    }

    pub fn with_unavailable(mut self, family: CoverageFamily) -> Self {
        self.unavailable.insert(family);
        self
    }

    pub fn option_count(&self) -> usize {
        self.options.values().map(Vec::len).sum()
    }

    fn apply_row(&mut self, row: CatalogRow, line: usize) -> Result<(), CatalogImportError> {
        let invalid = |reason: String| CatalogImportError::InvalidRow { row: line, reason };

        let family = parse_family(&row.family)
            .ok_or_else(|| invalid(format!("unknown family '{}'", row.family)))?;
        let id = row.id.ok_or_else(|| invalid("missing id".to_string()))?;
        let price = row
            .price
            .as_deref()
            .map(parse_decimal)
            .transpose()
            .map_err(invalid)?
            .ok_or_else(|| invalid("missing price".to_string()))?;
        let description = row.description.unwrap_or_default();

        match row.kind.to_ascii_lowercase().as_str() {
            "coverage" => {
                let plan_type_id = row
                    .plan_type_id
                    .ok_or_else(|| invalid("coverage rows need a plan_type_id".to_string()))?;
                let percentage_covered = row
                    .percentage_covered
                    .as_deref()
                    .map(parse_decimal)
                    .transpose()
                    .map_err(invalid)?
                    .unwrap_or(Decimal::ZERO);
                self.options
                    .entry((family, plan_type_id))
                    .or_default()
                    .push(CatalogOption {
                        id,
                        description,
                        unit_premium: price,
                        percentage_covered,
                    });
            }
            "copay" => {
                let category = parse_category(row.category.as_deref())
                    .ok_or_else(|| invalid("copay rows need a category".to_string()))?;
                self.copays
                    .entry((family, category))
                    .or_default()
                    .push(CopayOption {
                        id,
                        description,
                        unit_price: price,
                    });
            }
            "plan" => {
                let plan_type_id = row
                    .plan_type_id
                    .ok_or_else(|| invalid("plan rows need a plan_type_id".to_string()))?;
                let category = parse_category(row.category.as_deref())
                    .ok_or_else(|| invalid("plan rows need a category".to_string()))?;
                let plan_name = row
                    .plan_name
                    .as_deref()
                    .ok_or_else(|| invalid("plan rows need a plan_name".to_string()))?;
                self.plan_records
                    .entry((normalize_plan_name(plan_name), plan_type_id, category))
                    .or_default()
                    .push(PlanCoverageRecord {
                        family,
                        catalog_id: id,
                        description,
                        unit_premium: price,
                    });
            }
            other => return Err(invalid(format!("unknown row kind '{other}'"))),
        }

        Ok(())
    }
}

#[async_trait]
impl CatalogSource for CatalogTable {
    async fn fetch_catalog(
        &self,
        family: CoverageFamily,
        plan_type_id: u32,
    ) -> Result<Vec<CatalogOption>, CatalogError> {
        if self.unavailable.contains(&family) {
            return Err(CatalogError::Unavailable {
                family,
                reason: "marked unavailable".to_string(),
            });
        }
        Ok(self
            .options
            .get(&(family, plan_type_id))
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_copay_options(
        &self,
        family: CoverageFamily,
        category: ClientCategory,
    ) -> Result<Vec<CopayOption>, CatalogError> {
        if self.unavailable.contains(&family) {
            return Err(CatalogError::Unavailable {
                family,
                reason: "marked unavailable".to_string(),
            });
        }
        Ok(self
            .copays
            .get(&(family, category))
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_plan_records(
        &self,
        plan_name: &str,
        plan_type_id: u32,
        category: ClientCategory,
    ) -> Result<Vec<PlanCoverageRecord>, CatalogError> {
        Ok(self
            .plan_records
            .get(&(normalize_plan_name(plan_name), plan_type_id, category))
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Debug, Deserialize)]
struct CatalogRow {
    kind: String,
    family: String,
    #[serde(default)]
    plan_type_id: Option<u32>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    category: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    plan_name: Option<String>,
    #[serde(default)]
    id: Option<u32>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    description: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    price: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    percentage_covered: Option<String>,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

fn parse_decimal(raw: &str) -> Result<Decimal, String> {
    let cleaned = raw.trim().trim_start_matches('$').replace(',', "");
    Decimal::from_str(cleaned.trim()).map_err(|err| format!("invalid amount '{raw}' ({err})"))
}

fn parse_family(raw: &str) -> Option<CoverageFamily> {
    let normalized = raw
        .trim()
        .to_ascii_lowercase()
        .replace([' ', '-'], "_");
    match normalized.as_str() {
        "high_cost" | "highcost" | "alto_costo" => Some(CoverageFamily::HighCost),
        "medication" | "medicamentos" => Some(CoverageFamily::Medication),
        "room" | "habitacion" => Some(CoverageFamily::Room),
        "dental" => Some(CoverageFamily::Dental),
        other => other
            .parse::<u32>()
            .ok()
            .and_then(CoverageFamily::from_family_id),
    }
}

fn parse_category(raw: Option<&str>) -> Option<ClientCategory> {
    match raw?.trim().to_ascii_lowercase().as_str() {
        "individual" | "1" => Some(ClientCategory::Individual),
        "collective" | "colectivo" | "2" => Some(ClientCategory::Collective),
        _ => None,
    }
}

fn normalize_plan_name(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_lowercase()
}
