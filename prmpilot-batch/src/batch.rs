//! Record-level recovery boundary: one browser session, records in
//! order, one bad record never stops the batch.

use crate::dates;
use crate::record::Record;
use crate::workflow::{run_sequence, Auth, StepData, StepFailure};
use prmpilot::{AutomationError, Session};
use std::time::Duration;
use tracing::{error, info, warn};

/// Default settle delay between the few actions with no readiness signal.
pub const DEFAULT_SETTLE: Duration = Duration::from_secs(1);

/// Why a single record was skipped.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("field derivation: {0}")]
    Derive(AutomationError),
    #[error(transparent)]
    Step(#[from] StepFailure),
}

impl RecordError {
    fn is_record_scoped(&self) -> bool {
        match self {
            RecordError::Derive(e) => e.is_record_scoped(),
            RecordError::Step(f) => f.source.is_record_scoped(),
        }
    }

    fn into_automation(self) -> AutomationError {
        match self {
            RecordError::Derive(e) => e,
            RecordError::Step(f) => f.source,
        }
    }
}

#[derive(Debug)]
pub struct RecordFailure {
    pub index: usize,
    pub description: String,
    pub reason: String,
}

/// Outcome of a whole batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub attempted: usize,
    pub completed: usize,
    pub failures: Vec<RecordFailure>,
}

impl BatchReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// Drives the workflow once per record over a single session.
pub struct BatchDriver {
    auth: Auth,
    settle: Duration,
}

impl BatchDriver {
    pub fn new(auth: Auth) -> Self {
        Self {
            auth,
            settle: DEFAULT_SETTLE,
        }
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Processes `records` in order and closes the session afterwards,
    /// however many records failed. Only session-level errors (browser
    /// gone, reset impossible) abort the batch.
    pub async fn run(
        &self,
        mut session: Session,
        records: &[Record],
    ) -> Result<BatchReport, AutomationError> {
        let today = dates::today_string();
        let mut report = BatchReport::default();

        for (index, record) in records.iter().enumerate() {
            report.attempted += 1;
            info!(index, description = %record.description, "record start");
            // The previous record may have ended (or died) deep in a
            // popup or frame.
            if let Err(reset_err) = session.reset_to_top().await {
                error!(error = %reset_err, "cannot recover session");
                let _ = session.quit().await;
                return Err(reset_err);
            }
            match self.run_one(&mut session, record, &today).await {
                Ok(()) => {
                    report.completed += 1;
                    info!(index, "record complete");
                }
                Err(err) if err.is_record_scoped() => {
                    warn!(index, error = %err, "record failed, continuing");
                    report.failures.push(RecordFailure {
                        index,
                        description: record.description.clone(),
                        reason: err.to_string(),
                    });
                }
                Err(err) => {
                    let fatal = err.into_automation();
                    error!(index, error = %fatal, "session failure, aborting batch");
                    let _ = session.quit().await;
                    return Err(fatal);
                }
            }
        }

        session.quit().await?;
        Ok(report)
    }

    async fn run_one(
        &self,
        session: &mut Session,
        record: &Record,
        today: &str,
    ) -> Result<(), RecordError> {
        let data = StepData::for_record(record, &self.auth, today, self.settle)
            .map_err(RecordError::Derive)?;
        run_sequence(session, &data).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prmpilot::{ScriptedBackend, Waiter};
    use std::sync::Arc;

    fn bad_record(description: &str) -> Record {
        Record {
            description: description.into(),
            bi_service_name: "Reporting".into(),
            // No parenthesized code: derivation fails before any DOM work.
            bi_assignment_owner: "Jane Doe".into(),
            bi_team: "Core BI".into(),
            bi_swim_lanes: "Analytics (ana)".into(),
            executive_sponsor: "A. Exec".into(),
            bi_business_owner: "B. Owner".into(),
            bi_domain: "Finance".into(),
            requestor: "C. Req".into(),
            bi_liaison: "D. Liaison (dliaison)".into(),
            work_description: "work".into(),
            business_need: "need".into(),
        }
    }

    fn auth() -> Auth {
        Auth {
            new_work_url: "https://prm.example/new-work".into(),
            email: "user@example.com".into(),
            password: "secret".into(),
        }
    }

    #[tokio::test]
    async fn malformed_records_are_skipped_and_session_still_closes() {
        let backend = ScriptedBackend::new("about:blank");
        let session = Session::with_waiter(
            Arc::new(backend.clone()),
            Waiter::new(Duration::from_millis(5), Duration::from_millis(50)),
        );
        let driver = BatchDriver::new(auth()).with_settle(Duration::ZERO);

        let records = vec![bad_record("one"), bad_record("two")];
        let report = driver.run(session, &records).await.unwrap();

        assert_eq!(report.attempted, 2);
        assert_eq!(report.completed, 0);
        assert_eq!(report.failed(), 2);
        assert_eq!(report.failures[0].index, 0);
        assert_eq!(report.failures[1].index, 1);
        assert!(report.failures[0].reason.contains("BIAssignmentOwner"));
        assert!(backend.is_quit());
    }
}
