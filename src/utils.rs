use crate::error::{ForecastError, Result};
use chrono::{Days, NaiveDate};

/// Relative tolerance used by the identity checks.
pub const DEFAULT_TOLERANCE: f64 = 1e-9;

pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year.checked_add(1)? } else { year };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.checked_sub_days(Days::new(1))
}

pub fn validate_fiscal_year_end_month(month: u32) -> Result<()> {
    if !(1..=12).contains(&month) {
        return Err(ForecastError::InvalidFiscalYearEndMonth(month));
    }
    Ok(())
}

pub fn get_fiscal_year_end_date(year: i32, fiscal_month: u32) -> Result<NaiveDate> {
    validate_fiscal_year_end_month(fiscal_month)?;
    last_day_of_month(year, fiscal_month).ok_or_else(|| {
        ForecastError::InvalidTimeline(format!(
            "Fiscal year {} ending in month {} is out of the supported date range",
            year, fiscal_month
        ))
    })
}

/// `|a - b| <= tolerance * max(1, |a|, |b|)`
pub fn approx_eq(a: f64, b: f64, tolerance: f64) -> bool {
    let scale = 1.0_f64.max(a.abs()).max(b.abs());
    (a - b).abs() <= tolerance * scale
}

pub fn validate_finite(assumption: &str, period: Option<&str>, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(ForecastError::InvalidAssumption {
            assumption: assumption.to_string(),
            period: period.map(str::to_string),
            reason: format!("value must be a finite number, got {}", value),
        });
    }
    Ok(())
}

/// Ratios of revenue or cost, and the depreciation rate, must lie in [0, 1].
pub fn validate_ratio(assumption: &str, period: Option<&str>, value: f64) -> Result<()> {
    validate_finite(assumption, period, value)?;
    if !(0.0..=1.0).contains(&value) {
        return Err(ForecastError::InvalidAssumption {
            assumption: assumption.to_string(),
            period: period.map(str::to_string),
            reason: format!("ratio must be between 0 and 1, got {}", value),
        });
    }
    Ok(())
}

/// Growth rates may be negative but a rate of -100% or below would wipe out
/// (or flip the sign of) the base it compounds.
pub fn validate_growth_rate(assumption: &str, period: Option<&str>, value: f64) -> Result<()> {
    validate_finite(assumption, period, value)?;
    if value <= -1.0 {
        return Err(ForecastError::InvalidAssumption {
            assumption: assumption.to_string(),
            period: period.map(str::to_string),
            reason: format!("growth rate must be greater than -1.0, got {}", value),
        });
    }
    Ok(())
}

pub fn validate_historical(line: &str, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(ForecastError::InvalidHistorical {
            line: line.to_string(),
            reason: format!("value must be a finite number, got {}", value),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_day_of_month() {
        assert_eq!(
            last_day_of_month(2023, 2),
            NaiveDate::from_ymd_opt(2023, 2, 28)
        );
        assert_eq!(
            last_day_of_month(2024, 2),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
        assert_eq!(
            last_day_of_month(2023, 12),
            NaiveDate::from_ymd_opt(2023, 12, 31)
        );
    }

    #[test]
    fn test_fiscal_year_end_date() {
        let fy = get_fiscal_year_end_date(2023, 6).unwrap();
        assert_eq!(fy, NaiveDate::from_ymd_opt(2023, 6, 30).unwrap());

        assert!(matches!(
            get_fiscal_year_end_date(2023, 13),
            Err(ForecastError::InvalidFiscalYearEndMonth(13))
        ));
        assert!(get_fiscal_year_end_date(2023, 0).is_err());
    }

    #[test]
    fn test_approx_eq_is_relative() {
        assert!(approx_eq(1_000_000.0, 1_000_000.0005, 1e-9));
        assert!(!approx_eq(1_000_000.0, 1_000_000.01, 1e-9));
        // Near zero the scale floors at 1.0
        assert!(approx_eq(0.0, 1e-10, 1e-9));
        assert!(!approx_eq(0.0, 1e-8, 1e-9));
    }

    #[test]
    fn test_validate_ratio_bounds() {
        assert!(validate_ratio("cost_ratio", None, 0.0).is_ok());
        assert!(validate_ratio("cost_ratio", None, 1.0).is_ok());
        assert!(validate_ratio("cost_ratio", None, 1.01).is_err());
        assert!(validate_ratio("cost_ratio", None, -0.01).is_err());
        assert!(validate_ratio("cost_ratio", None, f64::NAN).is_err());
    }

    #[test]
    fn test_validate_growth_rate_reports_period() {
        let err = validate_growth_rate("revenue_growth", Some("2025E"), -1.0).unwrap_err();
        match err {
            ForecastError::InvalidAssumption {
                assumption, period, ..
            } => {
                assert_eq!(assumption, "revenue_growth");
                assert_eq!(period.as_deref(), Some("2025E"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(validate_growth_rate("revenue_growth", None, -0.5).is_ok());
    }
}
