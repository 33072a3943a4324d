use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use super::date_parser::parse_extract_date;

/// Deserialize the `date` column, coercing unparseable values to `None`
/// instead of failing the row.
fn de_extract_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_extract_date))
}

/// Deserialize an age-band counter, coercing missing, empty or non-numeric
/// cells to 0. Extracts occasionally carry float-formatted counts ("12.0").
fn de_count<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(match raw.as_deref().map(str::trim) {
        None | Some("") => 0,
        Some(s) => s.parse::<f64>().map(|v| v as i64).unwrap_or(0),
    })
}

/// One enrolment extract row: new registrations for a date/region/age band.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EnrolmentRecord {
    #[serde(deserialize_with = "de_extract_date", default)]
    pub date: Option<NaiveDate>,
    pub state: String,
    pub district: String,
    pub pincode: String,
    #[serde(deserialize_with = "de_count", default)]
    pub age_0_5: i64,
    #[serde(deserialize_with = "de_count", default)]
    pub age_5_17: i64,
    #[serde(rename = "age_18_greater", deserialize_with = "de_count", default)]
    pub age_18_plus: i64,
}

/// One update extract row. Biometric and demographic extracts share this
/// shape but prefix their age-band headers differently, hence the aliases.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpdateRecord {
    #[serde(deserialize_with = "de_extract_date", default)]
    pub date: Option<NaiveDate>,
    pub state: String,
    pub district: String,
    pub pincode: String,
    #[serde(
        alias = "bio_age_5_17",
        alias = "demo_age_5_17",
        deserialize_with = "de_count",
        default
    )]
    pub age_5_17: i64,
    #[serde(
        alias = "bio_age_17_",
        alias = "demo_age_17_",
        alias = "bio_age_18_greater",
        alias = "demo_age_18_greater",
        deserialize_with = "de_count",
        default
    )]
    pub age_18_plus: i64,
}

/// Common view over the record shapes, used by the aggregation passes.
pub trait Transaction {
    fn date(&self) -> Option<NaiveDate>;
    fn state(&self) -> &str;
    fn district(&self) -> &str;
    fn pincode(&self) -> &str;
    /// Sum of every age-band counter on this row.
    fn total(&self) -> i64;
}

impl Transaction for EnrolmentRecord {
    fn date(&self) -> Option<NaiveDate> {
        self.date
    }
    fn state(&self) -> &str {
        &self.state
    }
    fn district(&self) -> &str {
        &self.district
    }
    fn pincode(&self) -> &str {
        &self.pincode
    }
    fn total(&self) -> i64 {
        self.age_0_5 + self.age_5_17 + self.age_18_plus
    }
}

impl Transaction for UpdateRecord {
    fn date(&self) -> Option<NaiveDate> {
        self.date
    }
    fn state(&self) -> &str {
        &self.state
    }
    fn district(&self) -> &str {
        &self.district
    }
    fn pincode(&self) -> &str {
        &self.pincode
    }
    fn total(&self) -> i64 {
        self.age_5_17 + self.age_18_plus
    }
}
