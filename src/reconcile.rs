//! Reconciliation Workflow
//!
//! Each command runs the same decision procedure for every step it owns:
//!
//! 1. Planning: the step validates its inputs (also in check mode)
//! 2. Checking: the step reads current state from the server, if it can
//! 3. Decision:
//!    - desired state already holds: `NoOp`, nothing is sent
//!    - check mode: `WouldChange`, nothing is sent, the run counts as changed
//!    - otherwise: `Applied` after the mutation succeeds
//! 4. Reported: the outcome of every step plus an overall change flag
//!
//! Client failures are wrapped with a step-specific message and end the run.

use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::info;

use crate::client::{Client, ConnectionFactory};
use crate::error::{Result, WardenError};
use crate::model::{MasterInfo, User};

/// Options shared by every step of one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunContext {
    /// Report what would change without sending mutating statements
    pub dry_run: bool,
}

impl RunContext {
    #[must_use]
    pub const fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }
}

/// Outcome of a single step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    NoOp,
    WouldChange,
    Applied,
}

/// One line of the run report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub decision: Decision,
    pub message: String,
}

/// Accumulated outcome of a command
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub changed: bool,
    pub steps: Vec<Step>,
}

impl Report {
    fn record(&mut self, decision: Decision, message: String) {
        if decision != Decision::NoOp {
            self.changed = true;
        }
        self.steps.push(Step { decision, message });
    }

    /// Decisions in the order they were taken
    pub fn decisions(&self) -> impl Iterator<Item = Decision> + '_ {
        self.steps.iter().map(|step| step.decision)
    }

    #[must_use]
    pub fn summary(&self) -> String {
        format!("changed: {}", self.changed)
    }
}

/// A step that can be checked against the server and applied
pub trait Reconcile {
    /// Validate the plan; runs before anything reaches the server
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Whether the desired state already holds
    fn is_satisfied<F: ConnectionFactory>(
        &self,
        client: &mut Client<F>,
    ) -> impl Future<Output = Result<bool>>;

    /// Perform the mutation; `Ok(false)` means the server did not confirm it
    fn apply<F: ConnectionFactory>(&self, client: &mut Client<F>) -> impl Future<Output = Result<bool>>;

    fn satisfied_message(&self) -> String;
    fn would_change_message(&self) -> String;
    fn applied_message(&self) -> String;
    fn failure_message(&self) -> String;

    fn unconfirmed_message(&self) -> String {
        self.failure_message()
    }
}

/// Run one step through the decision procedure and record it in `report`
pub async fn reconcile<F, R>(
    client: &mut Client<F>,
    ctx: &RunContext,
    step: &R,
    report: &mut Report,
) -> Result<Decision>
where
    F: ConnectionFactory,
    R: Reconcile,
{
    step.validate()?;

    if step.is_satisfied(client).await.map_err(|e| wrap(step, e))? {
        info!(decision = "no_op", "desired state already holds");
        report.record(Decision::NoOp, step.satisfied_message());
        return Ok(Decision::NoOp);
    }

    if ctx.dry_run {
        info!(decision = "would_change", "check mode, not applying");
        report.record(Decision::WouldChange, step.would_change_message());
        return Ok(Decision::WouldChange);
    }

    if !step.apply(client).await.map_err(|e| wrap(step, e))? {
        return Err(WardenError::unconfirmed(step.unconfirmed_message()));
    }

    info!(decision = "applied", "change applied");
    report.record(Decision::Applied, step.applied_message());
    Ok(Decision::Applied)
}

fn wrap<R: Reconcile>(step: &R, err: WardenError) -> WardenError {
    match err {
        WardenError::Client { .. } => WardenError::operation(step.failure_message(), err),
        other => other,
    }
}

fn host_of(user: &User) -> &str {
    user.host().unwrap_or_default()
}

/// Desired state: the account exists
pub struct CreateAccount<'a>(pub &'a User);

impl Reconcile for CreateAccount<'_> {
    async fn is_satisfied<F: ConnectionFactory>(&self, client: &mut Client<F>) -> Result<bool> {
        self.0.exists(client).await
    }

    async fn apply<F: ConnectionFactory>(&self, client: &mut Client<F>) -> Result<bool> {
        self.0.create(client).await.map(|()| true)
    }

    fn satisfied_message(&self) -> String {
        format!(
            "I will not create user \"{}\" @host \"{}\" because one already exists.",
            self.0.name(),
            host_of(self.0)
        )
    }

    fn would_change_message(&self) -> String {
        format!("I would create the user \"{}\".", self.0.name())
    }

    fn applied_message(&self) -> String {
        format!("I have successfully created the user \"{}\".", self.0.name())
    }

    fn failure_message(&self) -> String {
        format!("I cannot create user \"{}\".", self.0.name())
    }
}

/// Desired state: the account does not exist
pub struct DropAccount<'a>(pub &'a User);

impl Reconcile for DropAccount<'_> {
    async fn is_satisfied<F: ConnectionFactory>(&self, client: &mut Client<F>) -> Result<bool> {
        Ok(!self.0.exists(client).await?)
    }

    async fn apply<F: ConnectionFactory>(&self, client: &mut Client<F>) -> Result<bool> {
        self.0.delete(client).await.map(|()| true)
    }

    fn satisfied_message(&self) -> String {
        format!(
            "I will not delete user \"{}\" @host \"{}\" because one does not exist.",
            self.0.name(),
            host_of(self.0)
        )
    }

    fn would_change_message(&self) -> String {
        format!("I would delete the user \"{}\" @host \"{}\".", self.0.name(), host_of(self.0))
    }

    fn applied_message(&self) -> String {
        format!(
            "I have successfully deleted the user \"{}\" @host \"{}\".",
            self.0.name(),
            host_of(self.0)
        )
    }

    fn failure_message(&self) -> String {
        format!("I cannot delete user \"{}\" @host \"{}\".", self.0.name(), host_of(self.0))
    }
}

/// Desired state: the account holds the requested privileges
///
/// Current grants are not inspected; `GRANT` is idempotent on the server, so
/// the step always applies.
pub struct GrantPrivileges<'a>(pub &'a User);

impl Reconcile for GrantPrivileges<'_> {
    fn validate(&self) -> Result<()> {
        self.0.grant_statement().map(drop)
    }

    async fn is_satisfied<F: ConnectionFactory>(&self, _client: &mut Client<F>) -> Result<bool> {
        Ok(false)
    }

    async fn apply<F: ConnectionFactory>(&self, client: &mut Client<F>) -> Result<bool> {
        self.0.grant(client).await.map(|()| true)
    }

    fn satisfied_message(&self) -> String {
        format!("The user \"{}\" already holds the requested privileges.", self.0.name())
    }

    fn would_change_message(&self) -> String {
        format!("I would grant privileges to the user \"{}\".", self.0.name())
    }

    fn applied_message(&self) -> String {
        format!("I have successfully granted privileges to the user \"{}\".", self.0.name())
    }

    fn failure_message(&self) -> String {
        format!("I cannot grant privileges to the user \"{}\".", self.0.name())
    }
}

/// Desired state: the replica points at the given master
///
/// Replication coordinates move on their own, so there is nothing reliable to
/// compare against; the step always applies.
pub struct ChangeMaster<'a>(pub &'a MasterInfo);

impl Reconcile for ChangeMaster<'_> {
    async fn is_satisfied<F: ConnectionFactory>(&self, _client: &mut Client<F>) -> Result<bool> {
        Ok(false)
    }

    async fn apply<F: ConnectionFactory>(&self, client: &mut Client<F>) -> Result<bool> {
        self.0.apply(client).await
    }

    fn satisfied_message(&self) -> String {
        "The slave is already configured with the master information.".to_string()
    }

    fn would_change_message(&self) -> String {
        format!(
            "I would configure the slave with the master information for \"{}\".",
            self.0.master_hostname()
        )
    }

    fn applied_message(&self) -> String {
        "I have successfully configured the slave with the master information.".to_string()
    }

    fn failure_message(&self) -> String {
        "I cannot execute the CHANGE MASTER query.".to_string()
    }

    fn unconfirmed_message(&self) -> String {
        "I cannot configure the slave with the master information.".to_string()
    }
}

/// Ensure an account exists, then grant it privileges if any were requested
///
/// Steps are recorded in `report` as they complete, so a run that fails part
/// way still shows what was already done.
pub async fn add_user<F: ConnectionFactory>(
    client: &mut Client<F>,
    ctx: &RunContext,
    user: &User,
    report: &mut Report,
) -> Result<()> {
    let create = CreateAccount(user);
    let grant = user.has_grants().then_some(GrantPrivileges(user));

    create.validate()?;
    if let Some(grant) = &grant {
        grant.validate()?;
    }

    reconcile(client, ctx, &create, report).await?;
    if let Some(grant) = &grant {
        reconcile(client, ctx, grant, report).await?;
    }
    Ok(())
}

/// Ensure an account does not exist
pub async fn delete_user<F: ConnectionFactory>(
    client: &mut Client<F>,
    ctx: &RunContext,
    user: &User,
    report: &mut Report,
) -> Result<()> {
    reconcile(client, ctx, &DropAccount(user), report).await.map(drop)
}

/// Point a replica at its master
pub async fn configure_master<F: ConnectionFactory>(
    client: &mut Client<F>,
    ctx: &RunContext,
    info: &MasterInfo,
    report: &mut Report,
) -> Result<()> {
    reconcile(client, ctx, &ChangeMaster(info), report).await.map(drop)
}
