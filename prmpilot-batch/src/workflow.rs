//! The fixed work-intake sequence: one record's journey from login
//! through both New Work pages, assignment, resource allocation, the
//! detail editor, and the final save.
//!
//! Steps are declarative data (name + function) so the runner can report
//! exactly where a record failed and tests can drive the list against a
//! scripted page. Every step resolves its targets through the session's
//! condition waiter; the handful of `settle` calls cover spots where the
//! application exposes no observable readiness signal (date widgets and
//! inline editors wire their key handlers a beat after the element
//! renders).

use crate::dates;
use crate::record::{Derived, Record};
use futures::future::BoxFuture;
use prmpilot::{AutomationError, Gesture, Key, Selector, Session, WindowOrdinal};
use std::time::Duration;
use tracing::info;

/// Structural queries for the screens the sequence walks through. The
/// title/label strings are copied verbatim from the application's DOM,
/// misspellings included ("stucture", "Liason").
pub mod sel {
    pub const EMAIL_INPUT: &str = "input[type='email']";
    pub const NEXT_BUTTON: &str = "text:Next";
    pub const PASSWORD_INPUT: &str = "input[type='password']";
    pub const LOGIN_SUBMIT: &str = "button[type='submit']";

    pub const WORKSTREAM_INPUT: &str = "div[class='attribute-part']\
[title='Description of the project parent in Work stucture'] > span > input";
    pub const DESCRIPTION_INPUT: &str =
        "input[title='The description of the project, or the work entity.']";
    pub const WORK_TYPE_OPTION: &str = "option[value='3036594']";
    pub const START_DATE_INPUT: &str = "input[title='The date the project has to be started. \
This date is used by the CPM forward pass for early date calculations. ']";
    pub const FINISH_DATE_INPUT: &str = "input[title='The date the project has to be completed \
by. This date is used by the CPM backward pass for late date calculations. ']";
    pub const SAVE_BUTTON: &str = "text:Save";

    pub const SCOPED_DATE_INPUT: &str =
        "div[class='attribute-field'][id='bi_scoped_date'] > div > input";
    pub const DATE_CREATED_INPUT: &str =
        "div[class='attribute-field'][id='bi_date_created'] > div > input";
    pub const SAVE_AND_COMPLETE: &str = "text:Save and Complete";
    pub const BANNER_ACTIONS: &str =
        "button[class='banner-title-bar-button'] > span[title='Actions']";
    pub const WORK_AND_ASSIGNMENTS: &str = "li[title='Work and Assignments']";

    pub const GRID_RIGHT: &str = "div[class='grid-canvas grid-canvas-top grid-canvas-right']";
    pub const GRID_LEFT: &str = "div[class='grid-canvas grid-canvas-top grid-canvas-left']";
    pub const STATUS_FLAG_CURRENT: &str = "text:No";
    pub const STATUS_FLAG_ENABLED: &str = "option[value='Y']";
    pub const OWNER_CELL: &str = "div:last-of-type > div:nth-child(3)";
    pub const TEAM_CELL: &str = "div > div:nth-child(2)";
    pub const ROW_ACTIONS: &str =
        "div:last-of-type > div > div[class='ActionLinkButton'][title='Actions']";

    pub const ASSIGNMENTS_ITEM: &str = "text:Assignments";
    pub const NEW_ALLOCATION: &str = "text:New Allocation";
    pub const SEARCH_VIEW_FRAME: &str = "iframe[name='iframeSearchView']";
    pub const ATTRIBUTES_FRAME: &str = "frame[id='frameAttributes']";
    pub const SEARCH_LIST_FRAME: &str = "frame[id='frameSearchList']";
    pub const RESOURCE_NAME_INPUT: &str = "input[id='attribute_description']";
    pub const SEARCH_SUBMIT: &str = "input[name='_search'][type='submit']";
    pub const RESULT_CHECKBOX: &str = "input[type='checkbox'][name='sel_list']";
    pub const POPUP_OK: &str = "input[type='button'][value='OK']";

    pub const MENU_AFFORDANCE: &str = "span[class='pv12MenuAffordanceIcon'][title='Actions']";
    pub const WORK_VIEW_ITEM: &str = "li[title='Work View']";
    pub const DESCRIBE_TAB: &str = "text:Describe & Categorize BI";
    pub const DETAIL_FRAME: &str = "iframe[name='pv-iframeSets-ConfiguredScreens59']";
    pub const EDIT_BUTTON: &str = "text:Edit";

    pub const DETAIL_WORK_TYPE_OPTION: &str =
        "//label[text()='BI Work Type']/parent::div//select/option[@value='3036593']";
    pub const SPONSOR_INPUT: &str = "//label[text()='Executive Sponsor']/parent::div//input";
    pub const BUSINESS_OWNER_INPUT: &str =
        "//label[text()='BI Business Owner']/parent::div//input";
    pub const DOMAIN_INPUT: &str =
        "//label[text()='BI Domain']/parent::div//input[@type='text']";
    pub const REQUESTOR_INPUT: &str =
        "//label[text()='Requestor']/parent::div//input[@type='text']";
    pub const LIAISON_SELECT: &str = "//label[text()='BI Liason']/parent::div//select";
    pub const WORK_DESCRIPTION_AREA: &str = "//div[@title='Detailed Work Description.']\
//div[@class='CodeMirror cm-s-paper CodeMirror-wrap']//div[@class='CodeMirror-lines']";
    pub const BUSINESS_NEED_AREA: &str =
        "//label[text()='Business Need']/parent::div/div[@class='attribute-field']\
//div[@class='CodeMirror cm-s-paper CodeMirror-wrap']//div[@class='CodeMirror-lines']";
    pub const DETAIL_SAVE: &str = "//button/span/span[@class='button-text'][text()='Save']";
}

/// Fixed parent label typed into the workstream picker on page 1.
pub const WORKSTREAM_LABEL: &str = "Business Intelligence";

pub fn swim_lane_option(code: &str) -> Selector {
    Selector::xpath(format!(
        "//label[text()='BI Swim Lanes']/parent::div//select/option[@value='{code}']"
    ))
}

/// Authentication parameters shared by every record in a batch.
#[derive(Debug, Clone)]
pub struct Auth {
    pub new_work_url: String,
    pub email: String,
    pub password: String,
}

/// Everything one sequence run needs, fully derived. Built once per
/// record, before any browser interaction.
#[derive(Debug, Clone)]
pub struct StepData {
    pub new_work_url: String,
    pub email: String,
    pub password: String,
    /// "Month Year <record description>".
    pub description: String,
    pub bi_service_name: String,
    pub owner_code: String,
    pub team_name: String,
    pub resource_name: String,
    pub swim_lane_code: String,
    pub executive_sponsor: String,
    pub business_owner: String,
    pub domain: String,
    pub requestor: String,
    pub liaison_code: String,
    pub work_description: String,
    pub business_need: String,
    /// Zero-padded MM/DD/YYYY.
    pub today: String,
    /// Unpadded M/D/YYYY, last day of `today`'s month.
    pub finish: String,
    pub settle: Duration,
}

impl StepData {
    pub fn for_record(
        record: &Record,
        auth: &Auth,
        today: &str,
        settle: Duration,
    ) -> Result<Self, AutomationError> {
        let derived = Derived::from_record(record)?;
        let label = dates::month_year_label(today)?;
        Ok(Self {
            new_work_url: auth.new_work_url.clone(),
            email: auth.email.clone(),
            password: auth.password.clone(),
            description: format!("{label} {}", record.description),
            bi_service_name: record.bi_service_name.clone(),
            owner_code: derived.owner_code,
            team_name: record.bi_team.clone(),
            resource_name: derived.resource_name,
            swim_lane_code: derived.swim_lane_code,
            executive_sponsor: record.executive_sponsor.clone(),
            business_owner: record.bi_business_owner.clone(),
            domain: record.bi_domain.clone(),
            requestor: record.requestor.clone(),
            liaison_code: derived.liaison_code,
            work_description: record.work_description.clone(),
            business_need: record.business_need.clone(),
            today: today.to_string(),
            finish: dates::end_of_month(today)?,
            settle,
        })
    }

    /// Bounded settle delay for the few spots with no observable
    /// readiness condition.
    async fn settle(&self) {
        if !self.settle.is_zero() {
            tokio::time::sleep(self.settle).await;
        }
    }
}

pub type StepFn =
    for<'a> fn(&'a mut Session, &'a StepData) -> BoxFuture<'a, Result<(), AutomationError>>;

pub struct Step {
    pub name: &'static str,
    pub run: StepFn,
}

/// The fixed step order for one record.
pub fn sequence() -> Vec<Step> {
    vec![
        Step { name: "ensure_authenticated", run: ensure_authenticated },
        Step { name: "new_work_page1", run: new_work_page1 },
        Step { name: "new_work_page2", run: new_work_page2 },
        Step { name: "enter_status_flag", run: enter_status_flag },
        Step { name: "assign_owner_and_team", run: assign_owner_and_team },
        Step { name: "allocate_resource", run: allocate_resource },
        Step { name: "open_work_detail", run: open_work_detail },
        Step { name: "fill_detail_fields", run: fill_detail_fields },
        Step { name: "save_edits", run: save_edits },
    ]
}

/// A step failure, annotated with where in the sequence it happened.
#[derive(Debug, thiserror::Error)]
#[error("step {index} ({name}): {source}")]
pub struct StepFailure {
    pub index: usize,
    pub name: &'static str,
    #[source]
    pub source: AutomationError,
}

/// Runs the whole sequence for one record. The first failing step aborts
/// the rest; there is no mid-sequence retry.
pub async fn run_sequence(session: &mut Session, data: &StepData) -> Result<(), StepFailure> {
    for (index, step) in sequence().into_iter().enumerate() {
        info!(index, step = step.name, "step start");
        (step.run)(session, data)
            .await
            .map_err(|source| StepFailure { index, name: step.name, source })?;
    }
    Ok(())
}

fn ensure_authenticated<'a>(
    session: &'a mut Session,
    data: &'a StepData,
) -> BoxFuture<'a, Result<(), AutomationError>> {
    Box::pin(async move {
        session.goto(&data.new_work_url).await?;
        data.settle().await;
        if session.current_url().await? != data.new_work_url {
            info!("redirected off the work-intake screen, logging in");
            session
                .locator(sel::EMAIL_INPUT)
                .wait()
                .await?
                .type_text(&data.email)
                .await?;
            session.locator(sel::NEXT_BUTTON).wait().await?.click().await?;
            session
                .locator(sel::PASSWORD_INPUT)
                .wait()
                .await?
                .type_text(&data.password)
                .await?;
            session.locator(sel::LOGIN_SUBMIT).wait().await?.click().await?;
            session
                .waiter()
                .url_is(session.backend().as_ref(), &data.new_work_url)
                .await?;
        }
        Ok(())
    })
}

fn new_work_page1<'a>(
    session: &'a mut Session,
    data: &'a StepData,
) -> BoxFuture<'a, Result<(), AutomationError>> {
    Box::pin(async move {
        session
            .locator(sel::WORKSTREAM_INPUT)
            .wait()
            .await?
            .type_text(WORKSTREAM_LABEL)
            .await?;
        session
            .locator(sel::DESCRIPTION_INPUT)
            .wait()
            .await?
            .type_text(&data.description)
            .await?;
        session.locator(sel::WORK_TYPE_OPTION).wait().await?.click().await?;

        // The date inputs attach their handlers after rendering.
        let start = session.locator(sel::START_DATE_INPUT).wait().await?;
        data.settle().await;
        start.type_text(&data.today).await?;

        let finish = session.locator(sel::FINISH_DATE_INPUT).wait().await?;
        data.settle().await;
        finish.type_text(&data.finish).await?;

        data.settle().await;
        session.locator(sel::SAVE_BUTTON).wait().await?.click().await?;
        Ok(())
    })
}

fn new_work_page2<'a>(
    session: &'a mut Session,
    data: &'a StepData,
) -> BoxFuture<'a, Result<(), AutomationError>> {
    Box::pin(async move {
        session
            .locator(Selector::text(&data.bi_service_name))
            .wait()
            .await?
            .click()
            .await?;
        session
            .locator(sel::SCOPED_DATE_INPUT)
            .wait()
            .await?
            .type_text(&data.today)
            .await?;
        session
            .locator(sel::DATE_CREATED_INPUT)
            .wait()
            .await?
            .type_text(&data.today)
            .await?;
        session.locator(sel::SAVE_AND_COMPLETE).wait().await?.click().await?;
        session.locator(sel::BANNER_ACTIONS).wait().await?.click().await?;
        session
            .locator(sel::WORK_AND_ASSIGNMENTS)
            .wait()
            .await?
            .click()
            .await?;
        Ok(())
    })
}

fn enter_status_flag<'a>(
    session: &'a mut Session,
    _data: &'a StepData,
) -> BoxFuture<'a, Result<(), AutomationError>> {
    Box::pin(async move {
        let grid = session.locator(sel::GRID_RIGHT).wait().await?;
        session
            .locator(sel::STATUS_FLAG_CURRENT)
            .within(&grid)
            .wait()
            .await?
            .click()
            .await?;
        session.send_key(Key::Enter).await?;
        session
            .locator(sel::STATUS_FLAG_ENABLED)
            .wait()
            .await?
            .click()
            .await?;
        Ok(())
    })
}

fn assign_owner_and_team<'a>(
    session: &'a mut Session,
    data: &'a StepData,
) -> BoxFuture<'a, Result<(), AutomationError>> {
    Box::pin(async move {
        let grid = session.locator(sel::GRID_RIGHT).wait().await?;
        let cells = session.locator(sel::OWNER_CELL).within(&grid).all().await?;
        let owner_cell = cells.last().ok_or_else(|| {
            AutomationError::NotFound("no owner cell in the right grid".to_string())
        })?;
        owner_cell.click().await?;
        data.settle().await;
        session.send_key(Key::Enter).await?;
        session
            .locator(Selector::option_value(&data.owner_code))
            .wait()
            .await?
            .click()
            .await?;

        let grid = session.locator(sel::GRID_RIGHT).wait().await?;
        session
            .locator(sel::TEAM_CELL)
            .within(&grid)
            .wait()
            .await?
            .click()
            .await?;
        data.settle().await;
        session.send_key(Key::Enter).await?;
        session
            .locator(Selector::text(&data.team_name))
            .wait()
            .await?
            .click()
            .await?;
        Ok(())
    })
}

fn allocate_resource<'a>(
    session: &'a mut Session,
    data: &'a StepData,
) -> BoxFuture<'a, Result<(), AutomationError>> {
    Box::pin(async move {
        let grid = session.locator(sel::GRID_LEFT).wait().await?;
        session
            .locator(sel::ROW_ACTIONS)
            .within(&grid)
            .wait()
            .await?
            .click()
            .await?;
        // The flyout item only becomes clickable after a real hover.
        session.locator(sel::ASSIGNMENTS_ITEM).wait().await?.hover().await?;
        session.locator(sel::NEW_ALLOCATION).wait().await?.click().await?;

        session.enter_window(WindowOrdinal::Last).await?;
        session.enter_frame(sel::SEARCH_VIEW_FRAME).await?;
        session.enter_frame(sel::ATTRIBUTES_FRAME).await?;
        session
            .locator(sel::RESOURCE_NAME_INPUT)
            .wait()
            .await?
            .type_text(&data.resource_name)
            .await?;
        session.locator(sel::SEARCH_SUBMIT).wait().await?.click().await?;

        session.pop_context().await?;
        session.enter_frame(sel::SEARCH_LIST_FRAME).await?;
        session
            .locator(sel::RESULT_CHECKBOX)
            .wait()
            .await?
            .click()
            .await?;

        // Back out to the popup's own top before confirming.
        session.pop_context().await?;
        session.pop_context().await?;
        session.locator(sel::POPUP_OK).wait().await?.click().await?;

        session.pop_context().await?;
        data.settle().await;
        Ok(())
    })
}

fn open_work_detail<'a>(
    session: &'a mut Session,
    data: &'a StepData,
) -> BoxFuture<'a, Result<(), AutomationError>> {
    Box::pin(async move {
        session.locator(sel::MENU_AFFORDANCE).wait().await?.click().await?;
        session.locator(sel::WORK_VIEW_ITEM).wait().await?.click().await?;
        session.locator(sel::DESCRIBE_TAB).wait().await?.click().await?;
        data.settle().await;
        session.enter_frame(sel::DETAIL_FRAME).await?;
        session.locator(sel::EDIT_BUTTON).wait().await?.click().await?;
        Ok(())
    })
}

fn fill_detail_fields<'a>(
    session: &'a mut Session,
    data: &'a StepData,
) -> BoxFuture<'a, Result<(), AutomationError>> {
    Box::pin(async move {
        session
            .locator(swim_lane_option(&data.swim_lane_code))
            .wait()
            .await?
            .click()
            .await?;
        session
            .locator(sel::DETAIL_WORK_TYPE_OPTION)
            .wait()
            .await?
            .click()
            .await?;

        let sponsor = session.locator(sel::SPONSOR_INPUT).wait().await?;
        data.settle().await;
        sponsor.clear().await?;
        sponsor.type_text(&data.executive_sponsor).await?;

        let owner = session.locator(sel::BUSINESS_OWNER_INPUT).wait().await?;
        data.settle().await;
        owner.clear().await?;
        owner.type_text(&data.business_owner).await?;

        // These two reject direct send_keys: focus must come from a real
        // pointer click.
        let domain = session.locator(sel::DOMAIN_INPUT).wait().await?;
        data.settle().await;
        session
            .perform(
                &Gesture::new()
                    .move_to(&domain)
                    .click()
                    .type_text(&data.domain),
            )
            .await?;

        let requestor = session.locator(sel::REQUESTOR_INPUT).wait().await?;
        data.settle().await;
        session
            .perform(
                &Gesture::new()
                    .move_to(&requestor)
                    .click()
                    .type_text(&data.requestor),
            )
            .await?;

        let liaison = session.locator(sel::LIAISON_SELECT).wait().await?;
        session
            .perform(&Gesture::new().move_to(&liaison).click())
            .await?;
        session
            .locator(Selector::option_value(&data.liaison_code))
            .within(&liaison)
            .wait()
            .await?
            .click()
            .await?;

        // CodeMirror areas: click to focus, then keys to the focused
        // editor rather than the wrapper div.
        session
            .locator(sel::WORK_DESCRIPTION_AREA)
            .wait()
            .await?
            .click()
            .await?;
        session
            .perform(&Gesture::new().type_text(&data.work_description))
            .await?;

        session
            .locator(sel::BUSINESS_NEED_AREA)
            .wait()
            .await?
            .click()
            .await?;
        session
            .perform(&Gesture::new().type_text(&data.business_need))
            .await?;
        Ok(())
    })
}

fn save_edits<'a>(
    session: &'a mut Session,
    data: &'a StepData,
) -> BoxFuture<'a, Result<(), AutomationError>> {
    Box::pin(async move {
        session.locator(sel::DETAIL_SAVE).wait().await?.click().await?;
        data.settle().await;
        Ok(())
    })
}
