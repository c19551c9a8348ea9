//! Salary deduction rules. The typed [`DeductionKind`] is the source of truth;
//! rows store it spread over `kind`, `amount_cents`, `rate` and `slabs`.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use entity::salary_deduction_rule::{self, Kind};
use platform_api::{ApiError, ApiResponse, ApiResult};
use platform_db::DbPool;
use products_hr::payroll::{DeductionKind, DeductionRule, TaxSlab};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::{
    AppState,
    access::{CurrentUser, keys},
    support::{double_option, find_or_404, now, optional_text, required_text},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/salary-deduction-rules",
            get(list_rules).post(create_rule),
        )
        .route(
            "/salary-deduction-rules/{id}",
            get(get_rule).put(update_rule).delete(delete_rule),
        )
}

#[derive(Debug, Deserialize)]
struct CreateRule {
    name: String,
    description: Option<String>,
    kind: Kind,
    amount_cents: Option<i64>,
    rate: Option<f64>,
    slabs: Option<Vec<TaxSlab>>,
    #[serde(default = "default_active")]
    is_active: bool,
    #[serde(default)]
    sort_order: i32,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct UpdateRule {
    name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    description: Option<Option<String>>,
    kind: Option<Kind>,
    amount_cents: Option<i64>,
    rate: Option<f64>,
    slabs: Option<Vec<TaxSlab>>,
    is_active: Option<bool>,
    sort_order: Option<i32>,
}

/// Builds the typed rule from loose columns, checking each kind has the
/// parameter it needs.
pub fn kind_from_parts(
    kind: Kind,
    amount_cents: Option<i64>,
    rate: Option<f64>,
    slabs: Option<Vec<TaxSlab>>,
) -> ApiResult<DeductionKind> {
    let missing = |field: &str| ApiError::bad_request(format!("{field} is required for this rule kind"));
    let typed = match kind {
        Kind::Fixed => DeductionKind::Fixed {
            amount_cents: amount_cents.ok_or_else(|| missing("amount_cents"))?,
        },
        Kind::PercentOfBasic => DeductionKind::PercentOfBasic {
            rate: rate.ok_or_else(|| missing("rate"))?,
        },
        Kind::PercentOfGross => DeductionKind::PercentOfGross {
            rate: rate.ok_or_else(|| missing("rate"))?,
        },
        Kind::TaxSlab => DeductionKind::TaxSlab {
            slabs: slabs.ok_or_else(|| missing("slabs"))?,
        },
    };
    typed.validate()?;
    Ok(typed)
}

/// Reads a stored row back into the typed rule.
pub fn to_rule(model: &salary_deduction_rule::Model) -> ApiResult<DeductionRule> {
    let slabs = match &model.slabs {
        Some(value) => Some(
            serde_json::from_value::<Vec<TaxSlab>>(value.clone())
                .map_err(|err| ApiError::internal(anyhow::anyhow!("rule {} has corrupt slabs: {err}", model.id)))?,
        ),
        None => None,
    };
    Ok(DeductionRule {
        name: model.name.clone(),
        kind: kind_from_parts(model.kind, model.amount_cents, model.rate, slabs)?,
    })
}

fn store_kind(active: &mut salary_deduction_rule::ActiveModel, kind: &DeductionKind) -> ApiResult<()> {
    let (tag, amount, rate, slabs) = match kind {
        DeductionKind::Fixed { amount_cents } => (Kind::Fixed, Some(*amount_cents), None, None),
        DeductionKind::PercentOfBasic { rate } => (Kind::PercentOfBasic, None, Some(*rate), None),
        DeductionKind::PercentOfGross { rate } => (Kind::PercentOfGross, None, Some(*rate), None),
        DeductionKind::TaxSlab { slabs } => (
            Kind::TaxSlab,
            None,
            None,
            Some(serde_json::to_value(slabs).map_err(ApiError::internal)?),
        ),
    };
    active.kind = Set(tag);
    active.amount_cents = Set(amount);
    active.rate = Set(rate);
    active.slabs = Set(slabs);
    Ok(())
}

/// Active rules in application order, with their ids.
pub async fn active_rules(db: &DbPool) -> ApiResult<(Vec<Uuid>, Vec<DeductionRule>)> {
    let rows = salary_deduction_rule::Entity::find()
        .filter(salary_deduction_rule::Column::IsActive.eq(true))
        .order_by_asc(salary_deduction_rule::Column::SortOrder)
        .order_by_asc(salary_deduction_rule::Column::Name)
        .all(db)
        .await?;
    let mut ids = Vec::with_capacity(rows.len());
    let mut rules = Vec::with_capacity(rows.len());
    for row in &rows {
        ids.push(row.id);
        rules.push(to_rule(row)?);
    }
    Ok((ids, rules))
}

async fn list_rules(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<ApiResponse<Vec<salary_deduction_rule::Model>>> {
    current.require(keys::DEDUCTION_RULES)?;
    let rows = salary_deduction_rule::Entity::find()
        .order_by_asc(salary_deduction_rule::Column::SortOrder)
        .order_by_asc(salary_deduction_rule::Column::Name)
        .all(&state.db)
        .await?;
    Ok(ApiResponse::ok("deduction rules", rows))
}

async fn get_rule(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<salary_deduction_rule::Model>> {
    current.require(keys::DEDUCTION_RULES)?;
    let row = find_or_404::<salary_deduction_rule::Entity>(&state.db, id, "deduction rule").await?;
    Ok(ApiResponse::ok("deduction rule", row))
}

async fn create_rule(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(body): Json<CreateRule>,
) -> ApiResult<ApiResponse<salary_deduction_rule::Model>> {
    current.require(keys::DEDUCTION_RULES)?;
    let name = required_text("name", &body.name, 120)?;
    let kind = kind_from_parts(body.kind, body.amount_cents, body.rate, body.slabs)?;
    let stamp = now();
    let mut active = salary_deduction_rule::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        description: Set(optional_text("description", body.description, 1000)?),
        is_active: Set(body.is_active),
        sort_order: Set(body.sort_order),
        created_at: Set(stamp),
        updated_at: Set(stamp),
        ..Default::default()
    };
    store_kind(&mut active, &kind)?;
    let created = active.insert(&state.db).await?;
    info!(rule_id = %created.id, kind = ?created.kind, "deduction rule created");
    Ok(ApiResponse::created("deduction rule created", created))
}

async fn update_rule(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateRule>,
) -> ApiResult<ApiResponse<salary_deduction_rule::Model>> {
    current.require(keys::DEDUCTION_RULES)?;
    let existing =
        find_or_404::<salary_deduction_rule::Entity>(&state.db, id, "deduction rule").await?;
    let kind_changed = body.kind.is_some()
        || body.amount_cents.is_some()
        || body.rate.is_some()
        || body.slabs.is_some();
    let typed = if kind_changed {
        let current_rule = to_rule(&existing)?;
        let (amount, rate, slabs) = match current_rule.kind {
            DeductionKind::Fixed { amount_cents } => (Some(amount_cents), None, None),
            DeductionKind::PercentOfBasic { rate } | DeductionKind::PercentOfGross { rate } => {
                (None, Some(rate), None)
            }
            DeductionKind::TaxSlab { slabs } => (None, None, Some(slabs)),
        };
        Some(kind_from_parts(
            body.kind.unwrap_or(existing.kind),
            body.amount_cents.or(amount),
            body.rate.or(rate),
            body.slabs.or(slabs),
        )?)
    } else {
        None
    };

    let mut active: salary_deduction_rule::ActiveModel = existing.into();
    if let Some(name) = &body.name {
        active.name = Set(required_text("name", name, 120)?);
    }
    if let Some(description) = body.description {
        active.description = Set(optional_text("description", description, 1000)?);
    }
    if let Some(kind) = &typed {
        store_kind(&mut active, kind)?;
    }
    if let Some(is_active) = body.is_active {
        active.is_active = Set(is_active);
    }
    if let Some(sort_order) = body.sort_order {
        active.sort_order = Set(sort_order);
    }
    active.updated_at = Set(now());
    let updated = active.update(&state.db).await?;
    info!(rule_id = %id, "deduction rule updated");
    Ok(ApiResponse::ok("deduction rule updated", updated))
}

async fn delete_rule(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<()>> {
    current.require(keys::DEDUCTION_RULES)?;
    find_or_404::<salary_deduction_rule::Entity>(&state.db, id, "deduction rule").await?;
    salary_deduction_rule::Entity::delete_by_id(id)
        .exec(&state.db)
        .await?;
    info!(rule_id = %id, "deduction rule deleted");
    Ok(ApiResponse::message("deduction rule deleted"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_kind_needs_its_parameter() {
        assert!(matches!(
            kind_from_parts(Kind::Fixed, None, Some(5.0), None),
            Err(ApiError::BadRequest(_))
        ));
        assert_eq!(
            kind_from_parts(Kind::PercentOfBasic, None, Some(12.0), None).unwrap(),
            DeductionKind::PercentOfBasic { rate: 12.0 }
        );
        assert!(kind_from_parts(Kind::PercentOfGross, None, Some(120.0), None).is_err());
        assert!(kind_from_parts(Kind::TaxSlab, None, None, Some(Vec::new())).is_err());
    }

    #[test]
    fn stored_slabs_round_trip_into_rules() {
        let slabs = vec![
            TaxSlab {
                from_cents: 0,
                to_cents: Some(100),
                rate: 0.0,
            },
            TaxSlab {
                from_cents: 100,
                to_cents: None,
                rate: 10.0,
            },
        ];
        let mut active = <salary_deduction_rule::ActiveModel as Default>::default();
        store_kind(&mut active, &DeductionKind::TaxSlab { slabs: slabs.clone() }).unwrap();
        let stamp = now();
        let model = salary_deduction_rule::Model {
            id: Uuid::new_v4(),
            name: "Income tax".into(),
            description: None,
            kind: Kind::TaxSlab,
            amount_cents: None,
            rate: None,
            slabs: active.slabs.clone().unwrap(),
            is_active: true,
            sort_order: 0,
            created_at: stamp,
            updated_at: stamp,
        };
        assert_eq!(to_rule(&model).unwrap().kind, DeductionKind::TaxSlab { slabs });
    }
}
