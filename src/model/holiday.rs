use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::error::AppError;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum HolidayType {
    National,
    Festival,
    Company,
}

impl TryFrom<String> for HolidayType {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct Holiday {
    #[schema(example = 3)]
    pub holiday_id: u64,
    #[schema(example = "Victory Day")]
    pub holiday_name: String,
    #[schema(example = "2026-12-16", value_type = String, format = "date")]
    pub holiday_date: NaiveDate,
    #[sqlx(try_from = "String")]
    pub holiday_type: HolidayType,
    #[schema(example = false)]
    pub is_optional: bool,
    #[schema(example = "Public holiday", nullable = true)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct HolidayReq {
    #[schema(example = "Victory Day")]
    pub holiday_name: String,
    #[schema(example = "2026-12-16", value_type = String, format = "date")]
    pub holiday_date: NaiveDate,
    pub holiday_type: HolidayType,
    #[serde(default)]
    pub is_optional: bool,
    pub description: Option<String>,
}

/// Absent fields stay untouched; the date may be echoed back but not changed.
#[derive(Debug, Deserialize, ToSchema)]
pub struct HolidayUpdate {
    pub holiday_name: Option<String>,
    #[schema(value_type = Option<String>, format = "date")]
    pub holiday_date: Option<NaiveDate>,
    pub holiday_type: Option<HolidayType>,
    pub is_optional: Option<bool>,
    pub description: Option<String>,
}

impl Holiday {
    pub fn apply(&mut self, update: HolidayUpdate) -> Result<(), AppError> {
        if update.holiday_date.is_some_and(|d| d != self.holiday_date) {
            return Err(AppError::bad_request("Holiday date cannot be changed"));
        }
        if let Some(name) = update.holiday_name {
            if name.trim().is_empty() {
                return Err(AppError::bad_request("Holiday name must not be empty"));
            }
            self.holiday_name = name.trim().to_string();
        }
        if let Some(kind) = update.holiday_type {
            self.holiday_type = kind;
        }
        if let Some(optional) = update.is_optional {
            self.is_optional = optional;
        }
        if update.description.is_some() {
            self.description = update.description;
        }
        Ok(())
    }
}

/// First and last day of a calendar year.
pub fn year_range(year: i32) -> Result<(NaiveDate, NaiveDate), AppError> {
    let first = NaiveDate::from_ymd_opt(year, 1, 1);
    let last = NaiveDate::from_ymd_opt(year, 12, 31);
    first
        .zip(last)
        .ok_or_else(|| AppError::bad_request("Invalid year"))
}

/// First and last day of a month; `month` must be 1..=12.
pub fn month_range(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate), AppError> {
    if !(1..=12).contains(&month) {
        return Err(AppError::bad_request("Month must be between 1 and 12"));
    }
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| AppError::bad_request("Invalid year"))?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    let last = next
        .and_then(|d| d.pred_opt())
        .ok_or_else(|| AppError::bad_request("Invalid year"))?;
    Ok((first, last))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn holiday() -> Holiday {
        Holiday {
            holiday_id: 1,
            holiday_name: "Victory Day".into(),
            holiday_date: date(2026, 12, 16),
            holiday_type: HolidayType::National,
            is_optional: false,
            description: None,
        }
    }

    #[test]
    fn holiday_type_parses_any_case() {
        assert_eq!("festival".parse::<HolidayType>().unwrap(), HolidayType::Festival);
        assert!("weekend".parse::<HolidayType>().is_err());
    }

    #[test]
    fn month_bounds() {
        assert_eq!(month_range(2024, 2).unwrap(), (date(2024, 2, 1), date(2024, 2, 29)));
        assert_eq!(month_range(2026, 12).unwrap(), (date(2026, 12, 1), date(2026, 12, 31)));
        assert!(month_range(2026, 0).is_err());
        assert_eq!(
            month_range(2026, 13).unwrap_err().to_string(),
            "Month must be between 1 and 12"
        );
    }

    #[test]
    fn year_bounds() {
        assert_eq!(year_range(2026).unwrap(), (date(2026, 1, 1), date(2026, 12, 31)));
    }

    #[test]
    fn update_keeps_the_date() {
        let mut h = holiday();
        h.apply(HolidayUpdate {
            holiday_name: Some(" Bijoy Dibosh ".into()),
            holiday_date: Some(date(2026, 12, 16)),
            holiday_type: Some(HolidayType::Festival),
            is_optional: None,
            description: Some("Renamed".into()),
        })
        .unwrap();
        assert_eq!(h.holiday_name, "Bijoy Dibosh");
        assert_eq!(h.holiday_type, HolidayType::Festival);
        assert!(!h.is_optional);

        let err = h
            .apply(HolidayUpdate {
                holiday_name: None,
                holiday_date: Some(date(2026, 12, 17)),
                holiday_type: None,
                is_optional: None,
                description: None,
            })
            .unwrap_err();
        assert_eq!(err.to_string(), "Holiday date cannot be changed");
    }
}
