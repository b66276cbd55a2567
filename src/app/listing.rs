//! In-memory listing pipeline: filter, sort, paginate.
//!
//! Fields are addressed by name through a static accessor table declared by
//! each [`Listable`] type, so an unknown field is a validation error rather
//! than a missing value.

use std::cmp::Reverse;

use validator::Validate;

use crate::domain::{ListQuery, PageResult, User, ValidationError};

/// Reads one string field out of a record.
pub type FieldAccessor<T> = fn(&T) -> &str;

/// A record type the pipeline can filter and sort.
pub trait Listable: Sized + 'static {
    /// Field names with their accessors.
    const FIELDS: &'static [(&'static str, FieldAccessor<Self>)];

    fn accessor(field: &str) -> Result<FieldAccessor<Self>, ValidationError> {
        Self::FIELDS
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, accessor)| *accessor)
            .ok_or_else(|| ValidationError::InvalidField {
                field: field.to_string(),
                message: format!(
                    "unknown field, expected one of: {}",
                    Self::FIELDS
                        .iter()
                        .map(|(name, _)| *name)
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            })
    }
}

fn user_id(user: &User) -> &str {
    &user.id
}

fn user_name(user: &User) -> &str {
    &user.name
}

fn user_email(user: &User) -> &str {
    &user.email
}

impl Listable for User {
    const FIELDS: &'static [(&'static str, FieldAccessor<Self>)] = &[
        ("id", user_id),
        ("name", user_name),
        ("email", user_email),
    ];
}

/// Splits `field:rest` on the first colon.
fn split_field<'a>(raw: &'a str, param: &str) -> Result<(&'a str, &'a str), ValidationError> {
    raw.split_once(':').ok_or_else(|| {
        ValidationError::InvalidFormat(format!("{param} must have the form 'field:value'"))
    })
}

/// Case-insensitive substring filter on one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSpec {
    pub field: String,
    pub needle: String,
}

impl FilterSpec {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let (field, value) = split_field(raw, "search")?;
        Ok(Self {
            field: field.to_string(),
            needle: value.to_lowercase(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
    /// Any other token. Leaves the order untouched.
    Unrecognized(String),
}

impl From<&str> for SortOrder {
    fn from(token: &str) -> Self {
        match token {
            "asc" => SortOrder::Asc,
            "desc" => SortOrder::Desc,
            other => SortOrder::Unrecognized(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: String,
    pub order: SortOrder,
}

impl SortSpec {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let (field, order) = split_field(raw, "sort")?;
        Ok(Self {
            field: field.to_string(),
            order: SortOrder::from(order),
        })
    }
}

/// Parsed listing parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListParams {
    pub page_number: u32,
    pub page_size: u32,
    pub filter: Option<FilterSpec>,
    pub sort: Option<SortSpec>,
}

impl ListParams {
    pub fn new(page_number: u32, page_size: u32) -> Self {
        Self {
            page_number,
            page_size,
            filter: None,
            sort: None,
        }
    }

    pub fn with_filter(mut self, raw: &str) -> Result<Self, ValidationError> {
        self.filter = Some(FilterSpec::parse(raw)?);
        Ok(self)
    }

    pub fn with_sort(mut self, raw: &str) -> Result<Self, ValidationError> {
        self.sort = Some(SortSpec::parse(raw)?);
        Ok(self)
    }
}

impl TryFrom<&ListQuery> for ListParams {
    type Error = ValidationError;

    fn try_from(query: &ListQuery) -> Result<Self, Self::Error> {
        query
            .validate()
            .map_err(|e| ValidationError::Multiple(e.to_string()))?;

        let mut params = ListParams::new(query.page_number, query.page_size);
        if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
            params = params.with_filter(search)?;
        }
        if let Some(sort) = query.sort.as_deref().filter(|s| !s.is_empty()) {
            params = params.with_sort(sort)?;
        }
        Ok(params)
    }
}

/// Runs filter → sort → paginate over `records` and projects the page.
///
/// Unknown filter or sort fields are rejected before any record is touched,
/// so the error does not depend on the data. Sorting is stable.
pub fn list<T, R>(
    mut records: Vec<T>,
    params: &ListParams,
    project: impl Fn(&T) -> R,
) -> Result<PageResult<R>, ValidationError>
where
    T: Listable,
{
    let filter = params
        .filter
        .as_ref()
        .map(|f| T::accessor(&f.field).map(|get| (get, f.needle.as_str())))
        .transpose()?;
    let sort = params
        .sort
        .as_ref()
        .map(|s| T::accessor(&s.field).map(|get| (get, &s.order)))
        .transpose()?;

    if let Some((get, needle)) = filter {
        records.retain(|record| get(record).to_lowercase().contains(needle));
    }

    if let Some((get, order)) = sort {
        match order {
            SortOrder::Asc => records.sort_by_cached_key(|record| get(record).to_lowercase()),
            SortOrder::Desc => {
                records.sort_by_cached_key(|record| Reverse(get(record).to_lowercase()))
            }
            SortOrder::Unrecognized(_) => {}
        }
    }

    let page_number = params.page_number.max(1);
    let page_size = params.page_size.max(1);
    let size = page_size as usize;
    let start = (page_number as usize - 1).saturating_mul(size);

    let count = records.len();
    let total_pages = count.div_ceil(size);
    let data = records.iter().skip(start).take(size).map(project).collect();

    Ok(PageResult {
        page_number,
        page_size,
        count,
        total_pages,
        has_previous_page: page_number > 1,
        has_next_page: (page_number as usize) < total_pages,
        data,
    })
}
