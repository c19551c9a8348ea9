//! Month-end payroll: generation from attendance, leave and roster, then the
//! DRAFT -> PROCESSED -> PAID lifecycle.
//!
//! Persisted lines carry loss of pay first (no rule id) followed by one line
//! per active rule, so `net = gross - sum(lines)` can be checked from the rows
//! alone.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use entity::{employee, payroll, payroll_deduction};
use platform_api::{ApiError, ApiResponse, ApiResult, Page};
use platform_db::DbPool;
use products_hr::{
    attendance::paid_days,
    leave::DateRange,
    payroll::{PayrollBreakdown, PayrollInput, compute},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    AppState,
    access::{CurrentUser, keys},
    attendance::{day_status, records_between},
    company::company_calendar,
    deduction_rules::active_rules,
    employees::{EmployeeView, populate},
    leaves::paid_leave_ranges,
    roster::off_days,
    support::{PageQuery, find_or_404, now, paginate, parse_period},
};

pub const LOSS_OF_PAY_LINE: &str = "Loss of pay";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/payroll", get(list_payroll))
        .route("/payroll/generate", post(generate_one))
        .route("/payroll/generate-all", post(generate_all))
        .route("/payroll/mine", get(my_payslips))
        .route("/payroll/{id}", get(get_payroll).delete(delete_payroll))
        .route("/payroll/{id}/process", post(mark_processed))
        .route("/payroll/{id}/pay", post(mark_paid))
}

#[derive(Debug, Deserialize)]
struct GenerateOne {
    employee_id: Uuid,
    year: i32,
    month: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateAll {
    year: i32,
    month: u32,
}

#[derive(Debug, Default, Deserialize)]
struct PayrollFilter {
    employee_id: Option<Uuid>,
    year: Option<i32>,
    month: Option<i32>,
    status: Option<payroll::Status>,
}

#[derive(Debug, Serialize)]
pub struct PayrollDetail {
    #[serde(flatten)]
    pub payroll: payroll::Model,
    pub lines: Vec<payroll_deduction::Model>,
    pub employee: Option<EmployeeView>,
}

#[derive(Debug, Serialize)]
struct RunEntry {
    employee_id: Uuid,
    employee_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    payroll_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

#[derive(Debug, Default, Serialize)]
struct RunReport {
    year: i32,
    month: u32,
    generated: Vec<RunEntry>,
    skipped: Vec<RunEntry>,
    failed: Vec<RunEntry>,
}

async fn existing_payroll(
    db: &DbPool,
    employee_id: Uuid,
    year: i32,
    month: u32,
) -> ApiResult<Option<payroll::Model>> {
    Ok(payroll::Entity::find()
        .filter(payroll::Column::EmployeeId.eq(employee_id))
        .filter(payroll::Column::Year.eq(year))
        .filter(payroll::Column::Month.eq(month as i32))
        .one(db)
        .await?)
}

async fn lines_of(db: &DbPool, payroll_id: Uuid) -> ApiResult<Vec<payroll_deduction::Model>> {
    Ok(payroll_deduction::Entity::find()
        .filter(payroll_deduction::Column::PayrollId.eq(payroll_id))
        .order_by_asc(payroll_deduction::Column::Position)
        .all(db)
        .await?)
}

async fn remove_payroll<C: ConnectionTrait>(db: &C, payroll_id: Uuid) -> ApiResult<()> {
    payroll_deduction::Entity::delete_many()
        .filter(payroll_deduction::Column::PayrollId.eq(payroll_id))
        .exec(db)
        .await?;
    payroll::Entity::delete_by_id(payroll_id).exec(db).await?;
    Ok(())
}

/// Computes the breakdown for one employee-month from stored attendance,
/// approved paid leave, roster off days and the active rules.
async fn breakdown_for(
    db: &DbPool,
    employee: &employee::Model,
    period: &DateRange,
) -> ApiResult<(PayrollBreakdown, Vec<Uuid>)> {
    let calendar = company_calendar(db)
        .await?
        .with_off_dates(off_days(db, employee.id, period).await?);
    let working_days = calendar.working_days(period.start, period.end).len() as u32;
    let attendance: Vec<_> = records_between(db, employee.id, period.start, period.end)
        .await?
        .into_iter()
        .map(|r| (r.date, day_status(r.status)))
        .collect();
    let leave = paid_leave_ranges(db, employee.id, period).await?;
    let paid = paid_days(&calendar, period, &attendance, &leave);
    let (rule_ids, rules) = active_rules(db).await?;
    let breakdown = compute(&PayrollInput {
        gross_cents: employee.gross_salary_cents,
        working_days,
        paid_days: paid,
        rules: &rules,
    })?;
    Ok((breakdown, rule_ids))
}

/// Generates (or regenerates) one payroll. A paid payroll is final.
async fn generate(
    db: &DbPool,
    employee: &employee::Model,
    year: i32,
    month: u32,
    generated_by: Uuid,
) -> ApiResult<payroll::Model> {
    let (start, end) = parse_period(year, month)?;
    let period = DateRange::new(start, end)?;
    let previous = existing_payroll(db, employee.id, year, month).await?;
    if previous
        .as_ref()
        .is_some_and(|p| p.status == payroll::Status::Paid)
    {
        return Err(ApiError::bad_request(format!(
            "payroll for {year}-{month:02} is already paid"
        )));
    }

    // The old payroll is only replaced once the new figures are known.
    let (breakdown, rule_ids) = breakdown_for(db, employee, &period).await?;
    let txn = db.begin().await?;
    if let Some(previous) = previous {
        remove_payroll(&txn, previous.id).await?;
    }
    let stamp = now();
    let split = breakdown.split;
    let lop = breakdown.loss_of_pay;
    let saved = payroll::ActiveModel {
        id: Set(Uuid::new_v4()),
        employee_id: Set(employee.id),
        year: Set(year),
        month: Set(month as i32),
        gross_cents: Set(split.gross_cents),
        basic_cents: Set(split.basic_cents),
        hra_cents: Set(split.hra_cents),
        allowance_cents: Set(split.allowance_cents),
        working_days: Set(lop.working_days),
        paid_days: Set(lop.paid_days),
        lop_days: Set(lop.lop_days),
        lop_cents: Set(lop.amount_cents),
        total_deductions_cents: Set(breakdown.total_deductions_cents),
        net_cents: Set(breakdown.net_cents),
        status: Set(payroll::Status::Draft),
        generated_by: Set(Some(generated_by)),
        processed_at: Set(None),
        paid_at: Set(None),
        created_at: Set(stamp),
        updated_at: Set(stamp),
    }
    .insert(&txn)
    .await?;

    let mut rows = Vec::with_capacity(breakdown.lines.len() + 1);
    if lop.amount_cents > 0 {
        rows.push(payroll_deduction::ActiveModel {
            id: Set(Uuid::new_v4()),
            payroll_id: Set(saved.id),
            rule_id: Set(None),
            name: Set(LOSS_OF_PAY_LINE.to_string()),
            amount_cents: Set(lop.amount_cents),
            position: Set(0),
        });
    }
    for line in &breakdown.lines {
        rows.push(payroll_deduction::ActiveModel {
            id: Set(Uuid::new_v4()),
            payroll_id: Set(saved.id),
            rule_id: Set(rule_ids.get(line.rule_index).copied()),
            name: Set(line.name.clone()),
            amount_cents: Set(line.amount_cents),
            position: Set(line.rule_index as i32 + 1),
        });
    }
    if !rows.is_empty() {
        payroll_deduction::Entity::insert_many(rows).exec(&txn).await?;
    }
    txn.commit().await?;
    info!(
        payroll_id = %saved.id,
        employee_id = %employee.id,
        year,
        month,
        gross = saved.gross_cents,
        net = saved.net_cents,
        "payroll generated"
    );
    Ok(saved)
}

async fn detail(db: &DbPool, payroll: payroll::Model) -> ApiResult<PayrollDetail> {
    let lines = lines_of(db, payroll.id).await?;
    let employee = match employee::Entity::find_by_id(payroll.employee_id).one(db).await? {
        Some(row) => populate(db, vec![row]).await?.pop(),
        None => None,
    };
    Ok(PayrollDetail {
        payroll,
        lines,
        employee,
    })
}

async fn generate_one(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(body): Json<GenerateOne>,
) -> ApiResult<ApiResponse<PayrollDetail>> {
    current.require(keys::PAYROLL)?;
    parse_period(body.year, body.month)?;
    let employee = find_or_404::<employee::Entity>(&state.db, body.employee_id, "employee").await?;
    if employee.status != employee::Status::Active {
        return Err(ApiError::bad_request("payroll can only be generated for active employees"));
    }
    let saved = generate(&state.db, &employee, body.year, body.month, current.id()).await?;
    Ok(ApiResponse::created(
        "payroll generated",
        detail(&state.db, saved).await?,
    ))
}

/// Runs every active employee in turn. One failure does not stop the run.
async fn generate_all(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(body): Json<GenerateAll>,
) -> ApiResult<ApiResponse<RunReport>> {
    current.require(keys::PAYROLL)?;
    parse_period(body.year, body.month)?;
    let employees = employee::Entity::find()
        .filter(employee::Column::Status.eq(employee::Status::Active))
        .order_by_asc(employee::Column::EmployeeCode)
        .all(&state.db)
        .await?;

    let mut report = RunReport {
        year: body.year,
        month: body.month,
        ..RunReport::default()
    };
    for employee in &employees {
        let entry = |payroll_id: Option<Uuid>, reason: Option<String>| RunEntry {
            employee_id: employee.id,
            employee_code: employee.employee_code.clone(),
            payroll_id,
            reason,
        };
        match existing_payroll(&state.db, employee.id, body.year, body.month).await? {
            Some(paid) if paid.status == payroll::Status::Paid => {
                report
                    .skipped
                    .push(entry(Some(paid.id), Some("already paid".into())));
                continue;
            }
            _ => {}
        }
        match generate(&state.db, employee, body.year, body.month, current.id()).await {
            Ok(saved) => report.generated.push(entry(Some(saved.id), None)),
            Err(err) => {
                warn!(employee_id = %employee.id, error = %err, "payroll generation failed");
                report.failed.push(entry(None, Some(err.to_string())));
            }
        }
    }
    info!(
        year = body.year,
        month = body.month,
        generated = report.generated.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "payroll run finished"
    );
    Ok(ApiResponse::ok("payroll run finished", report))
}

async fn list_payroll(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(filter): Query<PayrollFilter>,
    Query(paging): Query<PageQuery>,
) -> ApiResult<ApiResponse<Page<payroll::Model>>> {
    current.require(keys::PAYROLL)?;
    let mut query = payroll::Entity::find()
        .order_by_desc(payroll::Column::Year)
        .order_by_desc(payroll::Column::Month);
    if let Some(employee_id) = filter.employee_id {
        query = query.filter(payroll::Column::EmployeeId.eq(employee_id));
    }
    if let Some(year) = filter.year {
        query = query.filter(payroll::Column::Year.eq(year));
    }
    if let Some(month) = filter.month {
        query = query.filter(payroll::Column::Month.eq(month));
    }
    if let Some(status) = filter.status {
        query = query.filter(payroll::Column::Status.eq(status));
    }
    let (items, total, page, per_page) = paginate(&state.db, query, &paging).await?;
    Ok(ApiResponse::ok(
        "payroll",
        Page {
            items,
            total,
            page,
            per_page,
        },
    ))
}

/// The caller's own payslips. Drafts stay hidden until processed.
async fn my_payslips(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<ApiResponse<Vec<payroll::Model>>> {
    let employee_id = current.employee_id()?;
    let rows = payroll::Entity::find()
        .filter(payroll::Column::EmployeeId.eq(employee_id))
        .filter(payroll::Column::Status.ne(payroll::Status::Draft))
        .order_by_desc(payroll::Column::Year)
        .order_by_desc(payroll::Column::Month)
        .all(&state.db)
        .await?;
    Ok(ApiResponse::ok("my payslips", rows))
}

async fn get_payroll(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<PayrollDetail>> {
    let row = find_or_404::<payroll::Entity>(&state.db, id, "payroll").await?;
    if !current.can(keys::PAYROLL) {
        let own = current.user.employee_id == Some(row.employee_id);
        if !own || row.status == payroll::Status::Draft {
            return Err(ApiError::not_found("payroll"));
        }
    }
    Ok(ApiResponse::ok("payroll", detail(&state.db, row).await?))
}

async fn mark_processed(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<payroll::Model>> {
    current.require(keys::PAYROLL)?;
    let row = find_or_404::<payroll::Entity>(&state.db, id, "payroll").await?;
    if row.status != payroll::Status::Draft {
        return Err(ApiError::bad_request("only draft payrolls can be processed"));
    }
    let stamp = now();
    let mut active: payroll::ActiveModel = row.into();
    active.status = Set(payroll::Status::Processed);
    active.processed_at = Set(Some(stamp));
    active.updated_at = Set(stamp);
    let updated = active.update(&state.db).await?;
    info!(payroll_id = %id, "payroll processed");
    Ok(ApiResponse::ok("payroll processed", updated))
}

async fn mark_paid(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<payroll::Model>> {
    current.require(keys::PAYROLL)?;
    let row = find_or_404::<payroll::Entity>(&state.db, id, "payroll").await?;
    if row.status != payroll::Status::Processed {
        return Err(ApiError::bad_request("only processed payrolls can be paid"));
    }
    let stamp = now();
    let mut active: payroll::ActiveModel = row.into();
    active.status = Set(payroll::Status::Paid);
    active.paid_at = Set(Some(stamp));
    active.updated_at = Set(stamp);
    let updated = active.update(&state.db).await?;
    info!(payroll_id = %id, net = updated.net_cents, "payroll paid");
    Ok(ApiResponse::ok("payroll paid", updated))
}

async fn delete_payroll(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<()>> {
    current.require(keys::PAYROLL)?;
    let row = find_or_404::<payroll::Entity>(&state.db, id, "payroll").await?;
    if row.status != payroll::Status::Draft {
        return Err(ApiError::bad_request("only draft payrolls can be deleted"));
    }
    remove_payroll(&state.db, id).await?;
    info!(payroll_id = %id, "payroll deleted");
    Ok(ApiResponse::message("payroll deleted"))
}
