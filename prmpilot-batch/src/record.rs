use prmpilot::AutomationError;
use serde::Deserialize;

/// One row of the intake workbook. Column names match the workbook
/// headers verbatim.
#[derive(Debug, Clone, Deserialize)]
pub struct Record {
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "BIServiceName")]
    pub bi_service_name: String,
    #[serde(rename = "BIAssignmentOwner")]
    pub bi_assignment_owner: String,
    #[serde(rename = "BITeam")]
    pub bi_team: String,
    #[serde(rename = "BISwimLanes")]
    pub bi_swim_lanes: String,
    #[serde(rename = "ExecutiveSponsor")]
    pub executive_sponsor: String,
    #[serde(rename = "BIBusinessOwner")]
    pub bi_business_owner: String,
    #[serde(rename = "BIDomain")]
    pub bi_domain: String,
    #[serde(rename = "Requestor")]
    pub requestor: String,
    #[serde(rename = "BILiaison")]
    pub bi_liaison: String,
    #[serde(rename = "WorkDescription")]
    pub work_description: String,
    #[serde(rename = "BusinessNeed")]
    pub business_need: String,
}

/// Extracts the code between the first `(` and its matching `)` from a
/// "Display Name (code)" formatted field.
pub fn code_in_parens(field: &str, value: &str) -> Result<String, AutomationError> {
    let open = value.find('(').ok_or_else(|| {
        AutomationError::DataError(format!("{field}: no '(' in {value:?}"))
    })?;
    let close = value[open..].find(')').map(|i| open + i).ok_or_else(|| {
        AutomationError::DataError(format!("{field}: no ')' in {value:?}"))
    })?;
    Ok(value[open + 1..close].to_string())
}

/// The display-name part preceding the parenthesized code, trimmed.
pub fn name_before_parens(field: &str, value: &str) -> Result<String, AutomationError> {
    let open = value.find('(').ok_or_else(|| {
        AutomationError::DataError(format!("{field}: no '(' in {value:?}"))
    })?;
    Ok(value[..open].trim().to_string())
}

/// Fields computed from a record before the workflow starts. Derivation
/// fails fast, before any browser interaction, so a malformed record
/// never leaves half-entered data behind.
#[derive(Debug, Clone)]
pub struct Derived {
    /// Login code from "Display Name (code)".
    pub owner_code: String,
    /// Display name used for the resource search.
    pub resource_name: String,
    pub swim_lane_code: String,
    pub liaison_code: String,
}

impl Derived {
    pub fn from_record(record: &Record) -> Result<Self, AutomationError> {
        Ok(Self {
            owner_code: code_in_parens("BIAssignmentOwner", &record.bi_assignment_owner)?,
            resource_name: name_before_parens("BIAssignmentOwner", &record.bi_assignment_owner)?,
            swim_lane_code: code_in_parens("BISwimLanes", &record.bi_swim_lanes)?,
            liaison_code: code_in_parens("BILiaison", &record.bi_liaison)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(owner: &str) -> Record {
        Record {
            description: "Dashboard Refresh".into(),
            bi_service_name: "Reporting".into(),
            bi_assignment_owner: owner.into(),
            bi_team: "Core BI".into(),
            bi_swim_lanes: "Analytics (ana)".into(),
            executive_sponsor: "A. Exec".into(),
            bi_business_owner: "B. Owner".into(),
            bi_domain: "Finance".into(),
            requestor: "C. Req".into(),
            bi_liaison: "D. Liaison (dliaison)".into(),
            work_description: "desc".into(),
            business_need: "need".into(),
        }
    }

    #[test]
    fn code_is_substring_between_first_parens() {
        assert_eq!(code_in_parens("f", "Jane Doe (jdoe)").unwrap(), "jdoe");
        // Only the first pair counts.
        assert_eq!(code_in_parens("f", "A (x) B (y)").unwrap(), "x");
        assert_eq!(code_in_parens("f", "(only)").unwrap(), "only");
    }

    #[test]
    fn missing_parens_is_a_data_error() {
        let err = code_in_parens("BILiaison", "No Code Here").unwrap_err();
        assert!(matches!(err, AutomationError::DataError(_)));
        assert!(err.to_string().contains("BILiaison"));

        let err = code_in_parens("f", "Unclosed (code").unwrap_err();
        assert!(matches!(err, AutomationError::DataError(_)));
    }

    #[test]
    fn derived_fields_from_well_formed_record() {
        let derived = Derived::from_record(&record("Jane Doe (jdoe)")).unwrap();
        assert_eq!(derived.owner_code, "jdoe");
        assert_eq!(derived.resource_name, "Jane Doe");
        assert_eq!(derived.swim_lane_code, "ana");
        assert_eq!(derived.liaison_code, "dliaison");
    }

    #[test]
    fn derivation_fails_before_any_browser_work() {
        let err = Derived::from_record(&record("Jane Doe jdoe")).unwrap_err();
        assert!(matches!(err, AutomationError::DataError(_)));
    }

    #[test]
    fn csv_rows_deserialize_by_header_name() {
        let data = "\
Description,BIServiceName,BIAssignmentOwner,BITeam,BISwimLanes,ExecutiveSponsor,BIBusinessOwner,BIDomain,Requestor,BILiaison,WorkDescription,BusinessNeed
Dashboard Refresh,Reporting,Jane Doe (jdoe),Core BI,Analytics (ana),A. Exec,B. Owner,Finance,C. Req,D. Liaison (dliaison),work,need
";
        let mut reader = csv::Reader::from_reader(data.as_bytes());
        let rows: Vec<Record> = reader.deserialize().collect::<Result<_, _>>().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].bi_assignment_owner, "Jane Doe (jdoe)");
        assert_eq!(rows[0].business_need, "need");
    }
}
