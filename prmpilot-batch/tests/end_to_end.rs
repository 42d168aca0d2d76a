//! Full-sequence runs against a scripted page: every screen the workflow
//! touches is installed up front, then the journal is checked for the
//! interactions the record data should have produced.

use prmpilot::backend::scripted::{ActionRecord, Effect, NodeSpec};
use prmpilot::{Context, ScriptedBackend, Selector, Session, Waiter};
use prmpilot_batch::workflow::{sel, sequence, swim_lane_option};
use prmpilot_batch::{dates, run_sequence, Auth, BatchDriver, Record, StepData};
use std::sync::Arc;
use std::time::Duration;

const NEW_WORK_URL: &str = "https://prm.example/new-work";

fn auth() -> Auth {
    Auth {
        new_work_url: NEW_WORK_URL.into(),
        email: "user@example.com".into(),
        password: "secret".into(),
    }
}

fn sample_record() -> Record {
    Record {
        description: "Dashboard Refresh".into(),
        bi_service_name: "Reporting".into(),
        bi_assignment_owner: "Jane Doe (jdoe)".into(),
        bi_team: "Core BI".into(),
        bi_swim_lanes: "Analytics (ana)".into(),
        executive_sponsor: "A. Exec".into(),
        bi_business_owner: "B. Owner".into(),
        bi_domain: "Finance".into(),
        requestor: "C. Req".into(),
        bi_liaison: "D. Liaison (dliaison)".into(),
        work_description: "Refresh the dashboards".into(),
        business_need: "Stakeholders need numbers".into(),
    }
}

fn fast_session(backend: &ScriptedBackend) -> Session {
    Session::with_waiter(
        Arc::new(backend.clone()),
        Waiter::new(Duration::from_millis(5), Duration::from_millis(250)),
    )
}

/// Installs every node the nine steps touch, a few of them appearing
/// only after a poll or two to exercise the waiter.
fn scripted_application() -> ScriptedBackend {
    let backend = ScriptedBackend::new("about:blank");

    // New Work page 1.
    backend.install(0, &[], sel::WORKSTREAM_INPUT, NodeSpec::new());
    backend.install(0, &[], sel::DESCRIPTION_INPUT, NodeSpec::new());
    backend.install(0, &[], sel::WORK_TYPE_OPTION, NodeSpec::new());
    backend.install(0, &[], sel::START_DATE_INPUT, NodeSpec::new().appears_after(1));
    backend.install(0, &[], sel::FINISH_DATE_INPUT, NodeSpec::new());
    backend.install(0, &[], sel::SAVE_BUTTON, NodeSpec::new());

    // New Work page 2.
    backend.install(0, &[], "text:Reporting", NodeSpec::new().appears_after(2));
    backend.install(0, &[], sel::SCOPED_DATE_INPUT, NodeSpec::new());
    backend.install(0, &[], sel::DATE_CREATED_INPUT, NodeSpec::new());
    backend.install(0, &[], sel::SAVE_AND_COMPLETE, NodeSpec::new());
    backend.install(0, &[], sel::BANNER_ACTIONS, NodeSpec::new());
    backend.install(0, &[], sel::WORK_AND_ASSIGNMENTS, NodeSpec::new().appears_after(1));

    // Assignment grids.
    backend.install(0, &[], sel::GRID_RIGHT, NodeSpec::new());
    backend.install_under(0, &[], sel::GRID_RIGHT, sel::STATUS_FLAG_CURRENT, NodeSpec::new());
    backend.install(0, &[], sel::STATUS_FLAG_ENABLED, NodeSpec::new());
    backend.install_under(0, &[], sel::GRID_RIGHT, sel::OWNER_CELL, NodeSpec::new());
    backend.install(0, &[], Selector::option_value("jdoe"), NodeSpec::new());
    backend.install_under(0, &[], sel::GRID_RIGHT, sel::TEAM_CELL, NodeSpec::new());
    backend.install(0, &[], "text:Core BI", NodeSpec::new());

    // Resource allocation popup.
    backend.install(0, &[], sel::GRID_LEFT, NodeSpec::new());
    backend.install_under(0, &[], sel::GRID_LEFT, sel::ROW_ACTIONS, NodeSpec::new());
    backend.install(0, &[], sel::ASSIGNMENTS_ITEM, NodeSpec::new().appears_after(1));
    backend.install(
        0,
        &[],
        sel::NEW_ALLOCATION,
        NodeSpec::new().on_click(Effect::OpenWindow),
    );
    backend.install(1, &[], sel::SEARCH_VIEW_FRAME, NodeSpec::new());
    backend.install(1, &[sel::SEARCH_VIEW_FRAME], sel::ATTRIBUTES_FRAME, NodeSpec::new());
    backend.install(
        1,
        &[sel::SEARCH_VIEW_FRAME, sel::ATTRIBUTES_FRAME],
        sel::RESOURCE_NAME_INPUT,
        NodeSpec::new(),
    );
    backend.install(
        1,
        &[sel::SEARCH_VIEW_FRAME, sel::ATTRIBUTES_FRAME],
        sel::SEARCH_SUBMIT,
        NodeSpec::new(),
    );
    backend.install(
        1,
        &[sel::SEARCH_VIEW_FRAME],
        sel::SEARCH_LIST_FRAME,
        NodeSpec::new(),
    );
    backend.install(
        1,
        &[sel::SEARCH_VIEW_FRAME, sel::SEARCH_LIST_FRAME],
        sel::RESULT_CHECKBOX,
        NodeSpec::new().appears_after(1),
    );
    backend.install(
        1,
        &[],
        sel::POPUP_OK,
        NodeSpec::new().on_click(Effect::CloseWindow),
    );

    // Work view and the detail editor frame.
    backend.install(0, &[], sel::MENU_AFFORDANCE, NodeSpec::new());
    backend.install(0, &[], sel::WORK_VIEW_ITEM, NodeSpec::new());
    backend.install(0, &[], sel::DESCRIBE_TAB, NodeSpec::new());
    backend.install(0, &[], sel::DETAIL_FRAME, NodeSpec::new());
    let detail = [sel::DETAIL_FRAME];
    backend.install(0, &detail, sel::EDIT_BUTTON, NodeSpec::new());
    backend.install(0, &detail, swim_lane_option("ana"), NodeSpec::new());
    backend.install(0, &detail, sel::DETAIL_WORK_TYPE_OPTION, NodeSpec::new());
    backend.install(0, &detail, sel::SPONSOR_INPUT, NodeSpec::new());
    backend.install(0, &detail, sel::BUSINESS_OWNER_INPUT, NodeSpec::new());
    backend.install(0, &detail, sel::DOMAIN_INPUT, NodeSpec::new());
    backend.install(0, &detail, sel::REQUESTOR_INPUT, NodeSpec::new());
    backend.install(0, &detail, sel::LIAISON_SELECT, NodeSpec::new());
    backend.install_under(
        0,
        &detail,
        sel::LIAISON_SELECT,
        Selector::option_value("dliaison"),
        NodeSpec::new(),
    );
    backend.install(0, &detail, sel::WORK_DESCRIPTION_AREA, NodeSpec::new());
    backend.install(0, &detail, sel::BUSINESS_NEED_AREA, NodeSpec::new());
    backend.install(0, &detail, sel::DETAIL_SAVE, NodeSpec::new());

    backend
}

#[tokio::test]
async fn full_sequence_reaches_save_with_derived_fields() {
    let backend = scripted_application();
    let mut session = fast_session(&backend);

    let today = dates::today_string();
    let expected_finish = dates::end_of_month(&today).unwrap();
    let label = dates::month_year_label(&today).unwrap();
    let data =
        StepData::for_record(&sample_record(), &auth(), &today, Duration::ZERO).unwrap();

    run_sequence(&mut session, &data).await.unwrap();

    // Derived fields reached the right widgets.
    assert!(backend.clicked("option[value='jdoe']"), "owner code");
    assert_eq!(
        backend.typed_into("attribute_description"),
        vec!["Jane Doe"],
        "resource search uses the bare display name"
    );
    assert!(backend.clicked("option[@value='ana']"), "swim lane code");
    assert!(backend.clicked("option[value='dliaison']"), "liaison code");
    assert_eq!(
        backend.typed_into("work entity"),
        vec![format!("{label} Dashboard Refresh")],
        "description carries the month-year prefix"
    );
    assert_eq!(
        backend.typed_into("completed"),
        vec![expected_finish],
        "finish date is the last day of the current month"
    );
    assert_eq!(backend.typed_into("BI Domain"), vec!["Finance"]);
    assert_eq!(
        backend.typed_into("Detailed Work Description"),
        vec!["Refresh the dashboards"]
    );
    assert_eq!(
        backend.typed_into("Business Need"),
        vec!["Stakeholders need numbers"]
    );

    // The popup round trip happened and came back.
    let journal = backend.journal();
    let opened = journal
        .iter()
        .position(|r| *r == ActionRecord::SwitchWindow { index: 1 })
        .expect("switched into the popup");
    assert!(
        journal[opened..].contains(&ActionRecord::SwitchWindow { index: 0 }),
        "switched back to the main window"
    );

    // Save is the last click of the run.
    let last_click = journal
        .iter()
        .rev()
        .find_map(|r| match r {
            ActionRecord::Click { target } => Some(target.clone()),
            _ => None,
        })
        .unwrap();
    assert!(last_click.contains("button-text"), "ended on the save button");

    // The sequence ends inside the detail frame; that is the driver's
    // problem to reset, not the sequence's.
    assert_ne!(session.context(), Context::Top);
}

#[tokio::test]
async fn login_runs_only_when_redirected() {
    let backend = scripted_application();
    backend.redirect(NEW_WORK_URL, "https://login.example/");
    backend.install(0, &[], sel::EMAIL_INPUT, NodeSpec::new());
    backend.install(0, &[], sel::NEXT_BUTTON, NodeSpec::new());
    backend.install(0, &[], sel::PASSWORD_INPUT, NodeSpec::new().appears_after(1));
    backend.install(
        0,
        &[],
        sel::LOGIN_SUBMIT,
        NodeSpec::new().on_click(Effect::SetUrl(NEW_WORK_URL.into())),
    );
    let mut session = fast_session(&backend);
    let data =
        StepData::for_record(&sample_record(), &auth(), "03/14/2024", Duration::ZERO).unwrap();

    let steps = sequence();
    (steps[0].run)(&mut session, &data).await.unwrap();

    assert_eq!(backend.typed_into("email"), vec!["user@example.com"]);
    assert_eq!(backend.typed_into("password"), vec!["secret"]);
    assert!(backend.clicked("text:Next"));
    assert!(backend.clicked("button[type='submit']"));
    assert_eq!(session.current_url().await.unwrap(), NEW_WORK_URL);
}

#[tokio::test]
async fn already_authenticated_skips_credential_entry() {
    let backend = scripted_application();
    let mut session = fast_session(&backend);
    let data =
        StepData::for_record(&sample_record(), &auth(), "03/14/2024", Duration::ZERO).unwrap();

    let steps = sequence();
    (steps[0].run)(&mut session, &data).await.unwrap();

    assert!(backend.typed_into("email").is_empty());
    assert!(backend.typed_into("password").is_empty());
}

#[tokio::test]
async fn failing_record_does_not_stop_the_batch() {
    let backend = scripted_application();
    let session = fast_session(&backend);
    let driver = BatchDriver::new(auth()).with_settle(Duration::ZERO);

    let mut failing = sample_record();
    failing.description = "Broken Row".into();
    // A service name with no matching label fails page 2 by timeout.
    failing.bi_service_name = "Nonexistent Service".into();
    let records = vec![sample_record(), failing, sample_record()];

    let report = driver.run(session, &records).await.unwrap();

    assert_eq!(report.attempted, 3);
    assert_eq!(report.completed, 2);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.failures[0].index, 1);
    assert_eq!(report.failures[0].description, "Broken Row");
    assert!(
        report.failures[0].reason.contains("new_work_page2"),
        "failure names the step: {}",
        report.failures[0].reason
    );
    assert!(backend.is_quit());
}
