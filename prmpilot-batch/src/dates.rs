use chrono::{Datelike, Local, NaiveDate};
use prmpilot::AutomationError;

/// Today, zero-padded "MM/DD/YYYY" as the date inputs expect.
pub fn today_string() -> String {
    Local::now().date_naive().format("%m/%d/%Y").to_string()
}

/// Last calendar day of the month of `date_str`, rendered without
/// zero-padding ("3/31/2024") to match the finish-date field's format.
pub fn end_of_month(date_str: &str) -> Result<String, AutomationError> {
    let date = NaiveDate::parse_from_str(date_str, "%m/%d/%Y")
        .map_err(|e| AutomationError::DataError(format!("bad date {date_str:?}: {e}")))?;
    let (next_year, next_month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    let first_of_next = NaiveDate::from_ymd_opt(next_year, next_month, 1).ok_or_else(|| {
        AutomationError::DataError(format!("no month after {date_str:?}"))
    })?;
    let last = first_of_next.pred_opt().ok_or_else(|| {
        AutomationError::DataError(format!("no day before {first_of_next}"))
    })?;
    Ok(format!(
        "{}/{}/{}",
        last.month(),
        last.day(),
        last.year()
    ))
}

/// "March 2024" style label prepended to every project description.
pub fn month_year_label(date_str: &str) -> Result<String, AutomationError> {
    let date = NaiveDate::parse_from_str(date_str, "%m/%d/%Y")
        .map_err(|e| AutomationError::DataError(format!("bad date {date_str:?}: {e}")))?;
    Ok(date.format("%B %Y").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_of_month_day_count() {
        assert_eq!(end_of_month("03/14/2024").unwrap(), "3/31/2024");
        assert_eq!(end_of_month("02/10/2024").unwrap(), "2/29/2024"); // leap year
        assert_eq!(end_of_month("02/10/2023").unwrap(), "2/28/2023");
        assert_eq!(end_of_month("12/01/2024").unwrap(), "12/31/2024");
        assert_eq!(end_of_month("04/30/2024").unwrap(), "4/30/2024");
    }

    #[test]
    fn end_of_month_is_idempotent_on_its_output() {
        let once = end_of_month("06/05/2024").unwrap();
        // Output uses unpadded month/day; re-parse requires padding.
        let repadded = {
            let parts: Vec<&str> = once.split('/').collect();
            format!("{:0>2}/{:0>2}/{}", parts[0], parts[1], parts[2])
        };
        assert_eq!(end_of_month(&repadded).unwrap(), once);
    }

    #[test]
    fn malformed_date_is_a_data_error() {
        let err = end_of_month("2024-03-14").unwrap_err();
        assert!(matches!(err, AutomationError::DataError(_)));
    }

    #[test]
    fn month_year_label_spells_out_the_month() {
        assert_eq!(month_year_label("03/14/2024").unwrap(), "March 2024");
        assert_eq!(month_year_label("12/01/2023").unwrap(), "December 2023");
    }

    #[test]
    fn today_string_is_padded() {
        let today = today_string();
        assert_eq!(today.len(), 10);
        assert_eq!(today.matches('/').count(), 2);
    }
}
