use axum::{Json, Router, extract::State, routing::get};
use entity::company;
use platform_api::{ApiError, ApiResponse, ApiResult};
use platform_db::DbPool;
use products_hr::calendar::{WorkCalendar, format_weekdays, parse_weekdays};
use sea_orm::{ActiveModelTrait, EntityTrait, QueryOrder, Set};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::{
    AppState,
    access::{CurrentUser, keys},
    organisation::find_country,
    support::{double_option, normalize_email, now, optional_text, required_text},
};

pub const DEFAULT_WEEKLY_OFFS: &str = "sun";

pub fn routes() -> Router<AppState> {
    Router::new().route("/company", get(get_company).put(upsert_company))
}

#[derive(Debug, Default, Deserialize)]
struct CompanyBody {
    name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    legal_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    email: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    address: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    country_code: Option<Option<String>>,
    currency: Option<String>,
    timezone: Option<String>,
    weekly_offs: Option<String>,
}

pub async fn load_company(db: &DbPool) -> ApiResult<Option<company::Model>> {
    Ok(company::Entity::find()
        .order_by_asc(company::Column::CreatedAt)
        .one(db)
        .await?)
}

/// Weekly off days from the company profile, Sunday when none is set up.
pub async fn company_calendar(db: &DbPool) -> ApiResult<WorkCalendar> {
    let offs = load_company(db)
        .await?
        .map(|c| c.weekly_offs)
        .unwrap_or_else(|| DEFAULT_WEEKLY_OFFS.to_string());
    Ok(WorkCalendar::new(parse_weekdays(&offs)))
}

async fn get_company(
    State(state): State<AppState>,
    _current: CurrentUser,
) -> ApiResult<ApiResponse<company::Model>> {
    let row = load_company(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("company profile"))?;
    Ok(ApiResponse::ok("company", row))
}

async fn upsert_company(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(body): Json<CompanyBody>,
) -> ApiResult<ApiResponse<company::Model>> {
    current.require(keys::COMPANY)?;
    let existing = load_company(&state.db).await?;
    let stamp = now();
    let is_new = existing.is_none();
    let mut active = match existing {
        Some(row) => row.into(),
        None => {
            let name = body
                .name
                .as_deref()
                .ok_or_else(|| ApiError::bad_request("name is required"))?;
            company::ActiveModel {
                id: Set(Uuid::new_v4()),
                name: Set(required_text("name", name, 160)?),
                legal_name: Set(None),
                email: Set(None),
                phone: Set(None),
                address: Set(None),
                country_code: Set(None),
                currency: Set("USD".into()),
                timezone: Set("UTC".into()),
                weekly_offs: Set(DEFAULT_WEEKLY_OFFS.into()),
                created_at: Set(stamp),
                updated_at: Set(stamp),
            }
        }
    };
    apply(&mut active, body)?;
    active.updated_at = Set(stamp);
    let saved = if is_new {
        active.insert(&state.db).await?
    } else {
        active.update(&state.db).await?
    };
    info!(company_id = %saved.id, "company profile saved");
    Ok(ApiResponse::ok("company saved", saved))
}

fn apply(active: &mut company::ActiveModel, body: CompanyBody) -> ApiResult<()> {
    if let Some(name) = &body.name {
        active.name = Set(required_text("name", name, 160)?);
    }
    if let Some(legal_name) = body.legal_name {
        active.legal_name = Set(optional_text("legal_name", legal_name, 200)?);
    }
    if let Some(email) = body.email {
        let email = match optional_text("email", email, 320)? {
            Some(email) => Some(normalize_email(&email)?),
            None => None,
        };
        active.email = Set(email);
    }
    if let Some(phone) = body.phone {
        active.phone = Set(optional_text("phone", phone, 32)?);
    }
    if let Some(address) = body.address {
        active.address = Set(optional_text("address", address, 500)?);
    }
    if let Some(code) = body.country_code {
        let code = match optional_text("country_code", code, 2)? {
            Some(code) => Some(
                find_country(&code)
                    .ok_or_else(|| ApiError::bad_request(format!("unknown country code {code}")))?
                    .code
                    .to_string(),
            ),
            None => None,
        };
        active.country_code = Set(code);
    }
    if let Some(currency) = &body.currency {
        let currency = required_text("currency", currency, 3)?.to_uppercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ApiError::bad_request("currency must be a 3-letter ISO code"));
        }
        active.currency = Set(currency);
    }
    if let Some(timezone) = &body.timezone {
        active.timezone = Set(required_text("timezone", timezone, 64)?);
    }
    if let Some(offs) = &body.weekly_offs {
        let days = parse_weekdays(offs);
        if days.len() >= 7 {
            return Err(ApiError::bad_request("at least one working day is required"));
        }
        active.weekly_offs = Set(format_weekdays(&days));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::ActiveValue;

    fn blank() -> company::ActiveModel {
        company::ActiveModel {
            weekly_offs: Set(DEFAULT_WEEKLY_OFFS.into()),
            ..Default::default()
        }
    }

    #[test]
    fn weekly_offs_are_normalised() {
        let mut active = blank();
        let body = CompanyBody {
            weekly_offs: Some("Sat, sun, bogus".into()),
            ..Default::default()
        };
        apply(&mut active, body).unwrap();
        assert_eq!(active.weekly_offs, ActiveValue::Set("sat,sun".to_string()));
    }

    #[test]
    fn rejects_unknown_countries_and_bad_currency() {
        let body = CompanyBody {
            country_code: Some(Some("zz".into())),
            ..Default::default()
        };
        assert!(apply(&mut blank(), body).is_err());
        let body = CompanyBody {
            currency: Some("usdollar".into()),
            ..Default::default()
        };
        assert!(apply(&mut blank(), body).is_err());
        let body = CompanyBody {
            country_code: Some(Some("in".into())),
            currency: Some("inr".into()),
            ..Default::default()
        };
        let mut active = blank();
        apply(&mut active, body).unwrap();
        assert_eq!(active.currency, ActiveValue::Set("INR".to_string()));
        assert_eq!(active.country_code, ActiveValue::Set(Some("IN".to_string())));
    }
}
