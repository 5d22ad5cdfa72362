//! Book catalog model: entities, three-state patches, filters and paging.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Inclusive range accepted for `publication_year`.
pub const PUBLICATION_YEAR_RANGE: std::ops::RangeInclusive<i32> = 1000..=9999;

/// Longest `title` or `author` the catalog stores, in characters.
pub const MAX_NAME_LEN: usize = 255;

/// Page size applied when the caller asks for zero or fewer items.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// A catalog item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    /// Server-generated identifier.
    pub id: Uuid,
    /// Title; never blank.
    pub title: String,
    /// Author.
    pub author: Option<String>,
    /// Year of publication.
    pub publication_year: Option<i32>,
    /// Free-text description.
    pub description: Option<String>,
    /// Insert time.
    pub created_at: DateTime<Utc>,
    /// Time of the last successful update.
    pub updated_at: DateTime<Utc>,
}

impl Book {
    /// Applies the fields present in `patch`, leaving absent ones untouched.
    ///
    /// The patch must already have passed [`BookPatch::validate`].
    pub fn apply(&mut self, patch: &BookPatch, now: DateTime<Utc>) {
        if let Patch::Value(title) = &patch.title {
            self.title.clone_from(title);
        }
        patch.author.apply_to(&mut self.author);
        patch.publication_year.apply_to(&mut self.publication_year);
        patch.description.apply_to(&mut self.description);
        self.updated_at = now;
    }
}

/// Candidate for insertion; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBook {
    /// Title; required and non-blank.
    pub title: String,
    /// Author.
    #[serde(default)]
    pub author: Option<String>,
    /// Year of publication.
    #[serde(default)]
    pub publication_year: Option<i32>,
    /// Free-text description.
    #[serde(default)]
    pub description: Option<String>,
}

impl NewBook {
    /// Checks the candidate's field constraints.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the title is blank, the title or
    /// author is longer than [`MAX_NAME_LEN`], or the publication year is out
    /// of range.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.title.trim().is_empty() {
            return Err(DomainError::Validation("title is mandatory".to_owned()));
        }
        validate_len("title", &self.title)?;
        if let Some(author) = &self.author {
            validate_len("author", author)?;
        }
        validate_year(self.publication_year)
    }
}

fn validate_len(field: &str, value: &str) -> Result<(), DomainError> {
    if value.chars().count() > MAX_NAME_LEN {
        return Err(DomainError::Validation(format!(
            "{field} must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_year(year: Option<i32>) -> Result<(), DomainError> {
    match year {
        Some(y) if !PUBLICATION_YEAR_RANGE.contains(&y) => Err(DomainError::Validation(format!(
            "publication year {y} must be between {} and {}",
            PUBLICATION_YEAR_RANGE.start(),
            PUBLICATION_YEAR_RANGE.end()
        ))),
        _ => Ok(()),
    }
}

/// A field in a partial update.
///
/// Distinguishes a key missing from the request (`Absent`) from an explicit
/// JSON `null` (`Null`) and from a concrete value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Patch<T> {
    /// Leave the field untouched.
    #[default]
    Absent,
    /// Clear the field.
    Null,
    /// Set the field.
    Value(T),
}

impl<T: Clone> Patch<T> {
    /// Writes this patch into an optional field.
    pub fn apply_to(&self, field: &mut Option<T>) {
        match self {
            Self::Absent => {}
            Self::Null => *field = None,
            Self::Value(v) => *field = Some(v.clone()),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // A missing key never reaches here; `#[serde(default)]` yields `Absent`.
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(v) => Self::Value(v),
            None => Self::Null,
        })
    }
}

/// Partial update for one book.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookPatch {
    /// Book to update.
    pub id: Uuid,
    /// New title.
    #[serde(default)]
    pub title: Patch<String>,
    /// New author.
    #[serde(default)]
    pub author: Patch<String>,
    /// New publication year.
    #[serde(default)]
    pub publication_year: Patch<i32>,
    /// New description.
    #[serde(default)]
    pub description: Patch<String>,
}

impl BookPatch {
    /// A patch for `id` with every field absent.
    #[must_use]
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            title: Patch::Absent,
            author: Patch::Absent,
            publication_year: Patch::Absent,
            description: Patch::Absent,
        }
    }

    /// Checks the present fields' constraints.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the title is cleared or blank, the
    /// title or author is longer than [`MAX_NAME_LEN`], or the publication
    /// year is out of range.
    pub fn validate(&self) -> Result<(), DomainError> {
        match &self.title {
            Patch::Null => {
                return Err(DomainError::Validation(format!(
                    "title of book {} cannot be cleared",
                    self.id
                )));
            }
            Patch::Value(t) if t.trim().is_empty() => {
                return Err(DomainError::Validation(format!(
                    "title of book {} cannot be blank",
                    self.id
                )));
            }
            Patch::Value(t) => validate_len("title", t)?,
            Patch::Absent => {}
        }
        if let Patch::Value(author) = &self.author {
            validate_len("author", author)?;
        }
        if let Patch::Value(year) = self.publication_year {
            validate_year(Some(year))?;
        }
        Ok(())
    }
}

/// Filters for the paginated listing. `None` matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookFilter {
    /// Case-insensitive substring of the title.
    pub title: Option<String>,
    /// Case-insensitive substring of the author.
    pub author: Option<String>,
    /// Exact publication year.
    pub publication_year: Option<i32>,
}

impl BookFilter {
    /// Returns `true` if `book` satisfies every present filter.
    #[must_use]
    pub fn matches(&self, book: &Book) -> bool {
        fn contains(haystack: Option<&str>, needle: Option<&String>) -> bool {
            match needle {
                None => true,
                Some(n) => haystack.is_some_and(|h| h.to_lowercase().contains(&n.to_lowercase())),
            }
        }

        contains(Some(&book.title), self.title.as_ref())
            && contains(book.author.as_deref(), self.author.as_ref())
            && self
                .publication_year
                .is_none_or(|y| book.publication_year == Some(y))
    }
}

/// Sortable book attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    /// `title`
    Title,
    /// `author`
    Author,
    /// `publicationYear`
    PublicationYear,
}

impl SortField {
    /// Parses the external field name; unknown names yield `None`.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "title" => Some(Self::Title),
            "author" => Some(Self::Author),
            "publicationYear" => Some(Self::PublicationYear),
            _ => None,
        }
    }

    /// Column name in the `books` table.
    #[must_use]
    pub fn column(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Author => "author",
            Self::PublicationYear => "publication_year",
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

/// One sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortOrder {
    /// Attribute to sort on.
    pub field: SortField,
    /// Direction.
    pub direction: SortDirection,
}

impl SortOrder {
    /// Parses `"field"` or `"field,asc|desc"`. Unknown fields or directions
    /// yield `None` so the caller can drop them.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.split(',').map(str::trim);
        let field = SortField::parse(parts.next()?)?;
        let direction = match parts.next() {
            None => SortDirection::Asc,
            Some(d) if d.eq_ignore_ascii_case("asc") => SortDirection::Asc,
            Some(d) if d.eq_ignore_ascii_case("desc") => SortDirection::Desc,
            Some(_) => return None,
        };
        Some(Self { field, direction })
    }

    /// Compares two books on this key. Missing values sort last when
    /// ascending and first when descending.
    #[must_use]
    pub fn compare(&self, a: &Book, b: &Book) -> Ordering {
        fn nulls_last<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
            match (a, b) {
                (Some(a), Some(b)) => a.cmp(&b),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        }

        let ordering = match self.field {
            SortField::Title => a.title.cmp(&b.title),
            SortField::Author => nulls_last(a.author.as_deref(), b.author.as_deref()),
            SortField::PublicationYear => nulls_last(a.publication_year, b.publication_year),
        };
        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

/// Sanitized paging parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Zero-based page number.
    pub page: u32,
    /// Items per page; always positive.
    pub size: u32,
    /// Sort keys, applied in order; never empty.
    pub sort: Vec<SortOrder>,
}

impl PageRequest {
    /// Builds a request from untrusted input: a negative page becomes 0, a
    /// non-positive size becomes [`DEFAULT_PAGE_SIZE`], unparseable sort
    /// keys are dropped and an empty sort defaults to `title` ascending.
    #[must_use]
    pub fn sanitize(page: i64, size: i64, sort: &[String]) -> Self {
        let page = u32::try_from(page.max(0)).unwrap_or(u32::MAX);
        let size = if size <= 0 {
            DEFAULT_PAGE_SIZE
        } else {
            u32::try_from(size).unwrap_or(u32::MAX)
        };
        let mut sort: Vec<SortOrder> = sort.iter().filter_map(|s| SortOrder::parse(s)).collect();
        if sort.is_empty() {
            sort.push(SortOrder {
                field: SortField::Title,
                direction: SortDirection::Asc,
            });
        }
        Self { page, size, sort }
    }

    /// Number of rows to skip.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page) * u64::from(self.size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::sanitize(0, i64::from(DEFAULT_PAGE_SIZE), &[])
    }
}

/// One page of results with paging metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Items matching the filters across all pages.
    pub total_elements: u64,
    /// Number of pages.
    pub total_pages: u64,
    /// Zero-based page number.
    pub current_page: u32,
    /// Requested page size.
    pub page_size: u32,
    /// Whether a later page exists.
    pub has_next: bool,
    /// Whether an earlier page exists.
    pub has_previous: bool,
}

impl<T> Page<T> {
    /// Assembles a page and derives its metadata.
    #[must_use]
    pub fn new(items: Vec<T>, total_elements: u64, request: &PageRequest) -> Self {
        let total_pages = total_elements.div_ceil(u64::from(request.size));
        Self {
            items,
            total_elements,
            total_pages,
            current_page: request.page,
            page_size: request.size,
            has_next: u64::from(request.page) + 1 < total_pages,
            has_previous: request.page > 0,
        }
    }
}
