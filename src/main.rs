use anyhow::{anyhow, bail, Context};
use group_settlement::config::Settings;
use group_settlement::models::{DebtSummary, User};
use group_settlement::observability::{init_logging, init_metrics, LogConfig};
use group_settlement::repositories::{InMemoryExpenseRepository, InMemoryGroupRepository};
use group_settlement::services::{
    CreateExpenseRequest, CreateGroupRequest, ExpenseService, GroupService,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

/// A group history to replay, with users referenced by name.
#[derive(Debug, Deserialize)]
struct Scenario {
    group: ScenarioGroup,
    users: Vec<ScenarioUser>,
    #[serde(default)]
    expenses: Vec<ScenarioExpense>,
    #[serde(default)]
    settle_ups: Vec<ScenarioSettleUp>,
}

#[derive(Debug, Deserialize)]
struct ScenarioGroup {
    name: String,
    currency_code: Option<String>,
    debt_simplification: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
struct ScenarioUser {
    #[validate(length(min = 1, max = 100))]
    name: String,
    #[validate(email)]
    email: String,
}

#[derive(Debug, Deserialize)]
struct ScenarioExpense {
    payer: String,
    amount: Decimal,
    /// Every member when omitted.
    debtors: Option<Vec<String>>,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ScenarioSettleUp {
    payer: String,
    payee: String,
    amount: Decimal,
}

#[derive(Debug, Serialize)]
struct Report {
    group: String,
    currency: String,
    invite_code: String,
    balances: Vec<ReportLine>,
    settlement_plan: Vec<ReportLine>,
}

#[derive(Debug, Serialize)]
struct ReportLine {
    debtor: String,
    creditor: String,
    amount: Decimal,
}

fn main() -> anyhow::Result<()> {
    let settings = Settings::new().context("Failed to load configuration")?;
    init_logging(&LogConfig::from_settings(&settings.application))?;
    let metrics_handle = init_metrics()?;
    info!("Configuration loaded");

    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("APP_SCENARIO").ok())
        .ok_or_else(|| anyhow!("usage: group_settlement <scenario.json> (or set APP_SCENARIO)"))?;
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read scenario '{}'", path))?;
    let scenario: Scenario = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse scenario '{}'", path))?;

    let report = replay(&settings, scenario)?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    debug!(metrics = %metrics_handle.render(), "Metrics snapshot");
    Ok(())
}

fn replay(settings: &Settings, scenario: Scenario) -> anyhow::Result<Report> {
    let mut users: HashMap<String, User> = HashMap::new();
    for entry in scenario.users {
        entry.validate()?;
        if users.contains_key(&entry.name) {
            bail!("Duplicate user '{}' in scenario", entry.name);
        }
        users.insert(entry.name.clone(), User::new(entry.name, entry.email));
    }
    let lookup = |name: &str| -> anyhow::Result<User> {
        users
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow!("Unknown user '{}' in scenario", name))
    };
    let names: HashMap<Uuid, String> = users.values().map(|u| (u.id, u.name.clone())).collect();

    let group_repo = Arc::new(InMemoryGroupRepository::new());
    let expense_service = Arc::new(ExpenseService::new(
        Arc::new(InMemoryExpenseRepository::new()),
        group_repo.clone(),
    ));
    let group_service =
        GroupService::with_settings(group_repo, expense_service.clone(), settings.ledger.clone());

    let mut members = users.values().cloned().collect::<Vec<_>>();
    members.sort_by(|a, b| a.name.cmp(&b.name));
    let mut members = members.into_iter();
    let creator = members
        .next()
        .ok_or_else(|| anyhow!("Scenario must declare at least one user"))?;

    let mut request = CreateGroupRequest::new(scenario.group.name);
    request.currency_code = scenario.group.currency_code;
    request.debt_simplification = scenario.group.debt_simplification;
    let group = group_service.create_group(request, creator)?;
    for user in members {
        group_service.invite_to_group(group.id, user)?;
    }

    for entry in scenario.expenses {
        let mut request = CreateExpenseRequest::new(group.id, entry.amount, lookup(&entry.payer)?)
            .with_description(entry.description);
        if let Some(debtors) = entry.debtors {
            let debtors = debtors
                .iter()
                .map(|name| lookup(name))
                .collect::<anyhow::Result<Vec<_>>>()?;
            request = request.with_debtors(debtors);
        }
        expense_service.create_expense(request)?;
    }

    for entry in scenario.settle_ups {
        expense_service.settle_up(
            group.id,
            &lookup(&entry.payer)?,
            &lookup(&entry.payee)?,
            entry.amount,
        )?;
    }

    let to_line = |summary: DebtSummary| ReportLine {
        debtor: names.get(&summary.debtor_id).cloned().unwrap_or_default(),
        creditor: names.get(&summary.creditor_id).cloned().unwrap_or_default(),
        amount: summary.total_owed,
    };

    let balances = expense_service.calculate_debts(group.id)?;
    let plan = expense_service.get_settlement_plan(group.id)?;
    info!(
        pair_count = balances.len(),
        transfer_count = plan.len(),
        "Scenario replayed"
    );

    Ok(Report {
        group: group.name.clone(),
        currency: group.currency_code.clone(),
        invite_code: group.invite_code.clone(),
        balances: balances.to_summaries().into_iter().map(to_line).collect(),
        settlement_plan: plan.to_summaries().into_iter().map(to_line).collect(),
    })
}
