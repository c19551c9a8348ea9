//! Small helpers shared by the resource handlers.

use chrono::{NaiveDate, Utc};
use platform_api::{ApiError, ApiResult, page_bounds};
use platform_db::DbPool;
use sea_orm::{
    EntityTrait, PaginatorTrait, PrimaryKeyTrait, Select, prelude::DateTimeWithTimeZone,
};
use serde::{Deserialize, Deserializer};
use uuid::Uuid;

pub fn now() -> DateTimeWithTimeZone {
    Utc::now().into()
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Distinguishes an absent field (`None`) from an explicit `null`
/// (`Some(None)`) in PATCH-style bodies. Pair with `#[serde(default)]`.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

pub fn required_text(field: &str, value: &str, max: usize) -> ApiResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::bad_request(format!("{field} is required")));
    }
    validate_length(field, trimmed, max)?;
    Ok(trimmed.to_string())
}

pub fn optional_text(field: &str, value: Option<String>, max: usize) -> ApiResult<Option<String>> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(trimmed) => {
            validate_length(field, trimmed, max)?;
            Ok(Some(trimmed.to_string()))
        }
    }
}

fn validate_length(field: &str, value: &str, max: usize) -> ApiResult<()> {
    if value.chars().count() > max {
        return Err(ApiError::bad_request(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}

pub fn normalize_email(value: &str) -> ApiResult<String> {
    let trimmed = value.trim().to_lowercase();
    let valid = trimmed
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid {
        return Err(ApiError::bad_request("invalid email address"));
    }
    validate_length("email", &trimmed, 320)?;
    Ok(trimmed)
}

pub async fn find_or_404<E>(db: &DbPool, id: Uuid, what: &str) -> ApiResult<E::Model>
where
    E: EntityTrait,
    <E::PrimaryKey as PrimaryKeyTrait>::ValueType: From<Uuid>,
{
    E::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::not_found(what))
}

/// Like [`find_or_404`] for optional references: `None` passes through.
pub async fn ensure_ref<E>(db: &DbPool, id: Option<Uuid>, what: &str) -> ApiResult<()>
where
    E: EntityTrait,
    <E::PrimaryKey as PrimaryKeyTrait>::ValueType: From<Uuid>,
{
    if let Some(id) = id {
        find_or_404::<E>(db, id, what).await?;
    }
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

/// Runs `query` one page at a time and returns `(items, total, page, per_page)`.
pub async fn paginate<E>(
    db: &DbPool,
    query: Select<E>,
    paging: &PageQuery,
) -> ApiResult<(Vec<E::Model>, u64, u64, u64)>
where
    E: EntityTrait,
    E::Model: Sync,
{
    let (page, per_page) = page_bounds(paging.page, paging.per_page);
    let paginator = query.paginate(db, per_page);
    let total = paginator.num_items().await?;
    let items = paginator.fetch_page(page - 1).await?;
    Ok((items, total, page, per_page))
}

#[derive(Debug, Default, Clone, Copy, Deserialize)]
pub struct DateWindow {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateWindow {
    pub fn validate(&self) -> ApiResult<()> {
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(ApiError::bad_request("from must not be after to"));
            }
        }
        Ok(())
    }
}

pub fn parse_period(year: i32, month: u32) -> ApiResult<(NaiveDate, NaiveDate)> {
    products_hr::calendar::month_bounds(year, month).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "double_option")]
        manager_id: Option<Option<Uuid>>,
    }

    #[test]
    fn double_option_separates_null_from_missing() {
        let missing: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(missing.manager_id, None);
        let cleared: Patch = serde_json::from_str(r#"{"manager_id": null}"#).unwrap();
        assert_eq!(cleared.manager_id, Some(None));
        let id = Uuid::new_v4();
        let set: Patch = serde_json::from_str(&format!(r#"{{"manager_id": "{id}"}}"#)).unwrap();
        assert_eq!(set.manager_id, Some(Some(id)));
    }

    #[test]
    fn text_helpers_trim_and_limit() {
        assert_eq!(required_text("name", "  HR  ", 10).unwrap(), "HR");
        assert!(required_text("name", "   ", 10).is_err());
        assert!(required_text("name", "abcdefghijk", 10).is_err());
        assert_eq!(optional_text("note", Some(" ".into()), 10).unwrap(), None);
    }

    #[test]
    fn emails_are_lowercased() {
        assert_eq!(normalize_email(" Ada@Example.COM ").unwrap(), "ada@example.com");
        assert!(normalize_email("nobody").is_err());
        assert!(normalize_email("@example.com").is_err());
    }
}
