//! Data Cleaner Module
//! Per-column normalization of the raw tables: type coercion, categorical
//! dictionaries, null-sentinel substitution and whitespace fixes.

use indexmap::IndexMap;
use polars::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use super::model::{
    is_null_token, parse_date, CustomerRecord, Entity, PropertyRecord, Sex, UnmappedCategory,
    YesNo,
};

/// Expected column set of the properties table.
pub const PROPERTY_COLUMNS: [&str; 9] = [
    "ID",
    "building_number",
    "property_number",
    "area",
    "price_in_dollars",
    "sold",
    "country",
    "state",
    "deal_satisfaction",
];

/// Expected column set of the customers table.
pub const CUSTOMER_COLUMNS: [&str; 10] = [
    "customer_ID",
    "entity",
    "name",
    "surname",
    "sex",
    "birth_date",
    "purpose",
    "source",
    "mortgage",
    "date_of_sale",
];

#[derive(Error, Debug)]
pub enum CleanError {
    #[error("polars error: {0}")]
    PolarsError(#[from] PolarsError),
}

/// Per-table tally of cells the cleaner had to null out.
///
/// `malformed` counts type-coercion failures (non-numeric in a numeric
/// column, unparseable dates), `unmapped` counts categorical values outside
/// the column's dictionary, `inconsistent` counts cells dropped by a
/// cross-column rule (a state outside the USA). Keyed by column name,
/// insertion-ordered so the report prints in schema order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleaningReport {
    pub table: String,
    pub rows: usize,
    pub malformed: IndexMap<String, usize>,
    pub unmapped: IndexMap<String, usize>,
    pub inconsistent: IndexMap<String, usize>,
    pub duplicate_ids: usize,
}

impl CleaningReport {
    fn new(table: &str, rows: usize) -> Self {
        Self {
            table: table.to_string(),
            rows,
            ..Default::default()
        }
    }

    fn note_malformed(&mut self, column: &str) {
        *self.malformed.entry(column.to_string()).or_insert(0) += 1;
    }

    fn note_unmapped(&mut self, column: &str) {
        *self.unmapped.entry(column.to_string()).or_insert(0) += 1;
    }

    fn note_inconsistent(&mut self, column: &str) {
        *self.inconsistent.entry(column.to_string()).or_insert(0) += 1;
    }

    /// Total number of cells nulled out during cleaning.
    pub fn nulled_cells(&self) -> usize {
        self.malformed.values().sum::<usize>()
            + self.unmapped.values().sum::<usize>()
            + self.inconsistent.values().sum::<usize>()
    }
}

/// Stateless cleaning passes. Each transform looks at one row at a time;
/// the only cross-column rule is the country/state consistency fix.
pub struct TableCleaner;

impl TableCleaner {
    /// Clean the properties table. Returns the typed table and a report of
    /// every cell that was nulled out.
    pub fn clean_properties(df: &DataFrame) -> Result<(DataFrame, CleaningReport), CleanError> {
        let mut report = CleaningReport::new("properties", df.height());
        let records = Self::property_records(df, &mut report)?;

        let mut seen: IndexMap<&str, usize> = IndexMap::new();
        for record in &records {
            if let Some(id) = &record.id {
                *seen.entry(id.as_str()).or_insert(0) += 1;
            }
        }
        for (id, count) in &seen {
            if *count > 1 {
                warn!(id, occurrences = count, "duplicate property identifier");
                report.duplicate_ids += count - 1;
            }
        }

        let frame = DataFrame::new(vec![
            Column::new(
                "ID".into(),
                records.iter().map(|r| r.id.clone()).collect::<Vec<_>>(),
            ),
            Column::new(
                "building_number".into(),
                records.iter().map(|r| r.building).collect::<Vec<_>>(),
            ),
            Column::new(
                "property_number".into(),
                records
                    .iter()
                    .map(|r| r.property_number.clone())
                    .collect::<Vec<_>>(),
            ),
            Column::new(
                "area".into(),
                records.iter().map(|r| r.area).collect::<Vec<_>>(),
            ),
            Column::new(
                "price_in_dollars".into(),
                records.iter().map(|r| r.price).collect::<Vec<_>>(),
            ),
            Column::new(
                "sold".into(),
                records.iter().map(|r| r.sold).collect::<Vec<_>>(),
            ),
            Column::new(
                "country".into(),
                records.iter().map(|r| r.country.clone()).collect::<Vec<_>>(),
            ),
            Column::new(
                "state".into(),
                records.iter().map(|r| r.state.clone()).collect::<Vec<_>>(),
            ),
            Column::new(
                "deal_satisfaction".into(),
                records
                    .iter()
                    .map(|r| r.deal_satisfaction)
                    .collect::<Vec<_>>(),
            ),
        ])?;

        Ok((frame, report))
    }

    /// Clean the customers table. Categorical columns come out holding the
    /// dictionary's canonical labels, dates come out as ISO-8601 strings.
    pub fn clean_customers(df: &DataFrame) -> Result<(DataFrame, CleaningReport), CleanError> {
        let mut report = CleaningReport::new("customers", df.height());
        let records = Self::customer_records(df, &mut report)?;

        let iso = |date: &Option<chrono::NaiveDate>| {
            date.map(|d| d.format("%Y-%m-%d").to_string())
        };

        let frame = DataFrame::new(vec![
            Column::new(
                "customer_ID".into(),
                records
                    .iter()
                    .map(|r| r.customer_id.clone())
                    .collect::<Vec<_>>(),
            ),
            Column::new(
                "entity".into(),
                records
                    .iter()
                    .map(|r| r.entity.map(Entity::label))
                    .collect::<Vec<_>>(),
            ),
            Column::new(
                "name".into(),
                records.iter().map(|r| r.name.clone()).collect::<Vec<_>>(),
            ),
            Column::new(
                "surname".into(),
                records.iter().map(|r| r.surname.clone()).collect::<Vec<_>>(),
            ),
            Column::new(
                "sex".into(),
                records
                    .iter()
                    .map(|r| r.sex.map(Sex::label))
                    .collect::<Vec<_>>(),
            ),
            Column::new(
                "birth_date".into(),
                records.iter().map(|r| iso(&r.birth_date)).collect::<Vec<_>>(),
            ),
            Column::new(
                "purpose".into(),
                records.iter().map(|r| r.purpose.clone()).collect::<Vec<_>>(),
            ),
            Column::new(
                "source".into(),
                records.iter().map(|r| r.source.clone()).collect::<Vec<_>>(),
            ),
            Column::new(
                "mortgage".into(),
                records
                    .iter()
                    .map(|r| r.mortgage.map(YesNo::label))
                    .collect::<Vec<_>>(),
            ),
            Column::new(
                "date_of_sale".into(),
                records
                    .iter()
                    .map(|r| iso(&r.date_of_sale))
                    .collect::<Vec<_>>(),
            ),
        ])?;

        Ok((frame, report))
    }

    fn property_records(
        df: &DataFrame,
        report: &mut CleaningReport,
    ) -> Result<Vec<PropertyRecord>, CleanError> {
        let id = df.column("ID")?;
        let building = df.column("building_number")?;
        let number = df.column("property_number")?;
        let area = df.column("area")?;
        let price = df.column("price_in_dollars")?;
        let sold = df.column("sold")?;
        let country = df.column("country")?;
        let state = df.column("state")?;
        let satisfaction = df.column("deal_satisfaction")?;

        let mut records = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            let country_value = raw_cell(country, i);
            // State only means anything inside the USA; elsewhere the raw
            // cell is residue from the source spreadsheet.
            let state_value = match (&country_value, raw_cell(state, i)) {
                (Some(c), Some(s)) if c == "USA" => Some(s),
                (_, Some(_)) => {
                    report.note_inconsistent("state");
                    None
                }
                _ => None,
            };

            records.push(PropertyRecord {
                id: raw_cell(id, i),
                building: integer_cell(building, i, "building_number", report),
                property_number: raw_cell(number, i),
                area: numeric_cell(area, i, "area", report),
                price: numeric_cell(price, i, "price_in_dollars", report),
                sold: categorical_cell(sold, i, "sold", report, YesNo::from_raw)
                    .map(YesNo::as_bool),
                country: country_value,
                state: state_value,
                deal_satisfaction: numeric_cell(satisfaction, i, "deal_satisfaction", report),
            });
        }
        Ok(records)
    }

    fn customer_records(
        df: &DataFrame,
        report: &mut CleaningReport,
    ) -> Result<Vec<CustomerRecord>, CleanError> {
        let id = df.column("customer_ID")?;
        let entity = df.column("entity")?;
        let name = df.column("name")?;
        let surname = df.column("surname")?;
        let sex = df.column("sex")?;
        let birth = df.column("birth_date")?;
        let purpose = df.column("purpose")?;
        let source = df.column("source")?;
        let mortgage = df.column("mortgage")?;
        let sale = df.column("date_of_sale")?;

        let mut records = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            records.push(CustomerRecord {
                customer_id: raw_cell(id, i),
                entity: categorical_cell(entity, i, "entity", report, Entity::from_raw),
                name: raw_cell(name, i),
                surname: raw_cell(surname, i),
                sex: categorical_cell(sex, i, "sex", report, Sex::from_raw),
                birth_date: date_cell(birth, i, "birth_date", report),
                purpose: raw_cell(purpose, i).map(|s| s.to_lowercase()),
                source: raw_cell(source, i).map(|s| s.to_lowercase()),
                mortgage: categorical_cell(mortgage, i, "mortgage", report, YesNo::from_raw),
                date_of_sale: date_cell(sale, i, "date_of_sale", report),
            });
        }
        Ok(records)
    }
}

/// Trimmed string view of a cell, with null sentinels resolved to None.
fn raw_cell(column: &Column, i: usize) -> Option<String> {
    let value = column.get(i).ok()?;
    if value.is_null() {
        return None;
    }
    let text = value.to_string().trim_matches('"').trim().to_string();
    if is_null_token(&text) {
        None
    } else {
        Some(text)
    }
}

fn numeric_cell(column: &Column, i: usize, name: &str, report: &mut CleaningReport) -> Option<f64> {
    let text = raw_cell(column, i)?;
    match text.parse::<f64>() {
        Ok(value) => Some(value),
        Err(_) => {
            report.note_malformed(name);
            None
        }
    }
}

fn integer_cell(column: &Column, i: usize, name: &str, report: &mut CleaningReport) -> Option<i64> {
    let text = raw_cell(column, i)?;
    match text.parse::<i64>() {
        Ok(value) => Some(value),
        Err(_) => {
            report.note_malformed(name);
            None
        }
    }
}

fn date_cell(
    column: &Column,
    i: usize,
    name: &str,
    report: &mut CleaningReport,
) -> Option<chrono::NaiveDate> {
    let text = raw_cell(column, i)?;
    match parse_date(&text) {
        Some(date) => Some(date),
        None => {
            report.note_malformed(name);
            None
        }
    }
}

fn categorical_cell<T>(
    column: &Column,
    i: usize,
    name: &str,
    report: &mut CleaningReport,
    dictionary: fn(&str) -> Result<T, UnmappedCategory>,
) -> Option<T> {
    let text = raw_cell(column, i)?;
    match dictionary(&text) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(column = name, value = %err.value, "unmapped categorical value");
            report.note_unmapped(name);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_properties() -> DataFrame {
        DataFrame::new(vec![
            Column::new(
                "ID".into(),
                vec!["P1", "P2", "P3", "P4"],
            ),
            Column::new("building_number".into(), vec!["1", "1", "2", "two"]),
            Column::new("property_number".into(), vec!["10", "11", "20", "21"]),
            Column::new("area".into(), vec!["743.09", "N/A", "eight", "620.5"]),
            Column::new(
                "price_in_dollars".into(),
                vec!["246172.68", "198500.0", "expensive", "305000.0"],
            ),
            Column::new("sold".into(), vec!["1", "0", "yes", "maybe"]),
            Column::new("country".into(), vec!["USA ", "France", "USA", ""]),
            Column::new("state".into(), vec!["California", "Paris", "Nevada", "Texas"]),
            Column::new(
                "deal_satisfaction".into(),
                vec!["5", "3", "4", "2"],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn trailing_space_country_keeps_state() {
        let (df, _) = TableCleaner::clean_properties(&raw_properties()).unwrap();
        let country = df.column("country").unwrap().str().unwrap();
        let state = df.column("state").unwrap().str().unwrap();
        assert_eq!(country.get(0), Some("USA"));
        assert_eq!(state.get(0), Some("California"));
    }

    #[test]
    fn state_is_nulled_outside_the_usa() {
        let (df, _) = TableCleaner::clean_properties(&raw_properties()).unwrap();
        let state = df.column("state").unwrap().str().unwrap();
        assert_eq!(state.get(1), None);
        assert_eq!(state.get(2), Some("Nevada"));
        // Null country cannot vouch for the state either.
        assert_eq!(state.get(3), None);
    }

    #[test]
    fn dropped_states_count_toward_the_report() {
        let (_, report) = TableCleaner::clean_properties(&raw_properties()).unwrap();
        // Paris under France and Texas under a null country.
        assert_eq!(report.inconsistent.get("state"), Some(&2));
        // Three malformed numerics, one unmapped sold flag, two states.
        assert_eq!(report.nulled_cells(), 6);
    }

    #[test]
    fn malformed_numerics_become_null_and_are_counted() {
        let (df, report) = TableCleaner::clean_properties(&raw_properties()).unwrap();
        let area = df.column("area").unwrap().f64().unwrap();
        assert_eq!(area.get(0), Some(743.09));
        // N/A is a null sentinel and not counted; "eight" is malformed.
        assert_eq!(area.get(1), None);
        assert_eq!(area.get(2), None);
        assert_eq!(report.malformed.get("area"), Some(&1));
        assert_eq!(report.malformed.get("price_in_dollars"), Some(&1));
        assert_eq!(report.malformed.get("building_number"), Some(&1));
    }

    #[test]
    fn sold_flag_uses_the_yes_no_dictionary() {
        let (df, report) = TableCleaner::clean_properties(&raw_properties()).unwrap();
        let sold = df.column("sold").unwrap().bool().unwrap();
        assert_eq!(sold.get(0), Some(true));
        assert_eq!(sold.get(1), Some(false));
        assert_eq!(sold.get(2), Some(true));
        assert_eq!(sold.get(3), None);
        assert_eq!(report.unmapped.get("sold"), Some(&1));
    }

    #[test]
    fn duplicate_identifiers_are_reported() {
        let mut df = raw_properties();
        let ids = Column::new("ID".into(), vec!["P1", "P1", "P1", "P4"]);
        df.with_column(ids).unwrap();
        let (_, report) = TableCleaner::clean_properties(&df).unwrap();
        assert_eq!(report.duplicate_ids, 2);
    }

    fn raw_customers() -> DataFrame {
        DataFrame::new(vec![
            Column::new("customer_ID".into(), vec!["C1", "C2", "C3"]),
            Column::new("entity".into(), vec!["Individual", "Firm", "Charity"]),
            Column::new("name".into(), vec![" Anna ", "", "Luis"]),
            Column::new("surname".into(), vec!["Keller", "", "Ortega"]),
            Column::new("sex".into(), vec!["F", "", "M"]),
            Column::new(
                "birth_date".into(),
                vec!["1980-01-01", "", "31-31-1990"],
            ),
            Column::new("purpose".into(), vec!["Investment", "Office", "Home"]),
            Column::new("source".into(), vec!["Website", "Agency", "Referral"]),
            Column::new("mortgage".into(), vec!["Yes", "No", "perhaps"]),
            Column::new(
                "date_of_sale".into(),
                vec!["2010-01-01", "2006-07-15", "2007-03-01"],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn entity_labels_are_canonical() {
        let (df, report) = TableCleaner::clean_customers(&raw_customers()).unwrap();
        let entity = df.column("entity").unwrap().str().unwrap();
        assert_eq!(entity.get(0), Some("Individual"));
        assert_eq!(entity.get(1), Some("Business"));
        assert_eq!(entity.get(2), None);
        assert_eq!(report.unmapped.get("entity"), Some(&1));
    }

    #[test]
    fn purpose_and_source_are_lowercased() {
        let (df, _) = TableCleaner::clean_customers(&raw_customers()).unwrap();
        let purpose = df.column("purpose").unwrap().str().unwrap();
        let source = df.column("source").unwrap().str().unwrap();
        assert_eq!(purpose.get(0), Some("investment"));
        assert_eq!(source.get(2), Some("referral"));
    }

    #[test]
    fn unparseable_dates_become_null_and_are_counted() {
        let (df, report) = TableCleaner::clean_customers(&raw_customers()).unwrap();
        let birth = df.column("birth_date").unwrap().str().unwrap();
        assert_eq!(birth.get(0), Some("1980-01-01"));
        assert_eq!(birth.get(1), None);
        assert_eq!(birth.get(2), None);
        // The empty cell is a null sentinel, not a malformed date.
        assert_eq!(report.malformed.get("birth_date"), Some(&1));
    }

    #[test]
    fn names_are_trimmed() {
        let (df, _) = TableCleaner::clean_customers(&raw_customers()).unwrap();
        let name = df.column("name").unwrap().str().unwrap();
        assert_eq!(name.get(0), Some("Anna"));
        assert_eq!(name.get(1), None);
    }

    #[test]
    fn in_domain_categories_produce_no_nulls() {
        let df = DataFrame::new(vec![
            Column::new("customer_ID".into(), vec!["C1", "C2"]),
            Column::new("entity".into(), vec!["Individual", "Business"]),
            Column::new("name".into(), vec!["A", "B"]),
            Column::new("surname".into(), vec!["X", "Y"]),
            Column::new("sex".into(), vec!["F", "M"]),
            Column::new("birth_date".into(), vec!["1970-05-02", "1988-11-30"]),
            Column::new("purpose".into(), vec!["home", "investment"]),
            Column::new("source".into(), vec!["agency", "website"]),
            Column::new("mortgage".into(), vec!["yes", "no"]),
            Column::new("date_of_sale".into(), vec!["2005-03-04", "2009-12-01"]),
        ])
        .unwrap();
        let (cleaned, report) = TableCleaner::clean_customers(&df).unwrap();
        assert_eq!(report.nulled_cells(), 0);
        assert_eq!(cleaned.column("entity").unwrap().null_count(), 0);
        assert_eq!(cleaned.column("sex").unwrap().null_count(), 0);
        assert_eq!(cleaned.column("mortgage").unwrap().null_count(), 0);
    }
}
