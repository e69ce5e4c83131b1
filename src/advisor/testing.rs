//! In-memory advisory API for unit tests

use super::connector::Connect;
use super::model::{CheckDescription, CheckResult, FlaggedResource};
use super::AdvisorApi;
use anyhow::{anyhow, Result};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Columns of the "Service Limits" rows used throughout the tests
pub const SCHEMA: &[&str] = &["Region", "Service", "Limit Name", "Limit Amount"];

pub fn check(id: &str, category: &str, name: &str, metadata: &[&str]) -> CheckDescription {
    CheckDescription {
        id: id.to_string(),
        name: name.to_string(),
        description: String::new(),
        category: category.to_string(),
        metadata: metadata.iter().map(|s| s.to_string()).collect(),
    }
}

pub fn row(region: &str, values: &[&str]) -> FlaggedResource {
    FlaggedResource {
        status: "ok".to_string(),
        region: Some(region.to_string()),
        resource_id: format!("{}-{}", region, values.join("-")),
        is_suppressed: false,
        metadata: values.iter().map(|s| Some(s.to_string())).collect(),
    }
}

pub fn check_result(check_id: &str, rows: Vec<FlaggedResource>) -> CheckResult {
    CheckResult {
        check_id: check_id.to_string(),
        timestamp: "2015-06-15T20:27:42Z".to_string(),
        status: "warning".to_string(),
        flagged_resources: rows,
    }
}

#[derive(Clone, Default)]
pub struct FakeAdvisor {
    region: String,
    checks: Vec<CheckDescription>,
    checks_error: Option<String>,
    result: Option<CheckResult>,
    languages: Rc<RefCell<Vec<String>>>,
    result_requests: Rc<RefCell<Vec<String>>>,
}

impl FakeAdvisor {
    pub fn new(region: &str) -> Self {
        Self {
            region: region.to_string(),
            ..Self::default()
        }
    }

    pub fn with_checks(mut self, checks: Vec<CheckDescription>) -> Self {
        self.checks = checks;
        self
    }

    pub fn with_result(mut self, result: CheckResult) -> Self {
        self.result = Some(result);
        self
    }

    pub fn failing_checks(mut self, message: &str) -> Self {
        self.checks_error = Some(message.to_string());
        self
    }

    pub fn languages(&self) -> Vec<String> {
        self.languages.borrow().clone()
    }

    pub fn result_requests(&self) -> Vec<String> {
        self.result_requests.borrow().clone()
    }
}

impl AdvisorApi for FakeAdvisor {
    fn region(&self) -> &str {
        &self.region
    }

    async fn describe_checks(&self, language: &str) -> Result<Vec<CheckDescription>> {
        self.languages.borrow_mut().push(language.to_string());
        match &self.checks_error {
            Some(message) => Err(anyhow!("{}", message)),
            None => Ok(self.checks.clone()),
        }
    }

    async fn describe_check_result(&self, check_id: &str, _language: &str) -> Result<CheckResult> {
        self.result_requests.borrow_mut().push(check_id.to_string());
        self.result
            .clone()
            .filter(|result| result.check_id == check_id)
            .ok_or_else(|| anyhow!("API request failed: 400 (InvalidParameterValueException)"))
    }
}

#[derive(Clone, Copy)]
enum FailMode {
    Never,
    First,
    Always,
}

/// Hands out clones of a [`FakeAdvisor`] and counts how often it was asked
pub struct CountingConnect {
    session: FakeAdvisor,
    calls: Rc<Cell<usize>>,
    fail: FailMode,
}

impl CountingConnect {
    pub fn new(session: FakeAdvisor) -> Self {
        Self {
            session,
            calls: Rc::new(Cell::new(0)),
            fail: FailMode::Never,
        }
    }

    pub fn failing_first(session: FakeAdvisor) -> Self {
        Self {
            fail: FailMode::First,
            ..Self::new(session)
        }
    }

    pub fn always_failing(session: FakeAdvisor) -> Self {
        Self {
            fail: FailMode::Always,
            ..Self::new(session)
        }
    }

    pub fn calls(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.calls)
    }
}

impl Connect for CountingConnect {
    type Session = FakeAdvisor;

    async fn establish(&self) -> Result<FakeAdvisor> {
        let attempt = self.calls.get() + 1;
        self.calls.set(attempt);
        match (self.fail, attempt) {
            (FailMode::Always, _) | (FailMode::First, 1) => {
                Err(anyhow!("connection refused"))
            }
            _ => Ok(self.session.clone()),
        }
    }
}
