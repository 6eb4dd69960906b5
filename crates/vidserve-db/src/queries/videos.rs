//! Video catalog queries.
//!
//! CRUD helpers for catalog rows plus the filtered, sorted and paginated
//! search behind `/videos/search`. Search input is validated up front into a
//! [`VideoQuery`]; a query that exists is always executable.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::{params, Connection, Row, ToSql};
use thiserror::Error;
use vidserve_common::{Error, Result, VideoId};

use crate::models::{Page, VideoMetadata};

const SELECT_COLUMNS: &str = "SELECT id, title, creator, description, video_filename, video_mime_type,
        cover_filename, cover_mime_type, upload_date
 FROM videos";

/// Fields required to register a video in the catalog.
#[derive(Debug, Clone)]
pub struct NewVideo {
    pub id: Option<VideoId>,
    pub title: String,
    pub creator: String,
    pub description: Option<String>,
    pub video_filename: String,
    pub video_mime_type: String,
    pub cover_filename: String,
    pub cover_mime_type: String,
    pub upload_date: Option<DateTime<Utc>>,
}

impl NewVideo {
    /// Minimal registration with default MIME types (`video/mp4`, `image/jpeg`).
    pub fn new(
        title: impl Into<String>,
        creator: impl Into<String>,
        video_filename: impl Into<String>,
        cover_filename: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            title: title.into(),
            creator: creator.into(),
            description: None,
            video_filename: video_filename.into(),
            video_mime_type: "video/mp4".to_string(),
            cover_filename: cover_filename.into(),
            cover_mime_type: "image/jpeg".to_string(),
            upload_date: None,
        }
    }
}

/// Column a search can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    Title,
    Creator,
    #[default]
    UploadDate,
}

impl SortField {
    fn column(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Creator => "creator",
            Self::UploadDate => "upload_date",
        }
    }
}

impl std::str::FromStr for SortField {
    type Err = QueryError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "title" => Ok(Self::Title),
            "creator" => Ok(Self::Creator),
            "upload_date" => Ok(Self::UploadDate),
            other => Err(QueryError::InvalidSortField(other.to_string())),
        }
    }
}

/// Why a search request could not be turned into a query.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("Invalid sort_by field: {0}")]
    InvalidSortField(String),

    #[error("Invalid date format. Please use YYYY-MM-DD.")]
    InvalidDate(String),
}

impl From<QueryError> for Error {
    fn from(e: QueryError) -> Self {
        Error::invalid_input(e.to_string())
    }
}

/// Raw search parameters as received from a client.
#[derive(Debug, Clone, Default)]
pub struct SearchParams {
    pub title: Option<String>,
    pub creator: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
}

/// A validated catalog search.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VideoQuery {
    pub title: Option<String>,
    pub creator: Option<String>,
    pub uploaded_between: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub sort: SortField,
    pub descending: bool,
}

impl VideoQuery {
    /// Validate raw parameters.
    ///
    /// Empty strings count as absent. The date window only applies when both
    /// ends are given. Any `order` other than `desc` sorts ascending.
    pub fn build(params: &SearchParams) -> std::result::Result<Self, QueryError> {
        let non_empty = |v: &Option<String>| v.as_deref().filter(|s| !s.is_empty()).map(str::to_string);

        let uploaded_between = match (non_empty(&params.start_date), non_empty(&params.end_date)) {
            (Some(start), Some(end)) => Some((parse_date(&start)?, parse_date(&end)?)),
            _ => None,
        };

        let sort = match params.sort_by.as_deref() {
            None => SortField::default(),
            Some(s) => s.parse()?,
        };

        Ok(Self {
            title: non_empty(&params.title),
            creator: non_empty(&params.creator),
            uploaded_between,
            sort,
            descending: params.order.as_deref() == Some("desc"),
        })
    }
}

/// Page selection, 1-based.
#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Pagination {
    pub const MAX_PER_PAGE: u32 = 100;

    /// Clamp to `page >= 1` and `1 <= per_page <= MAX_PER_PAGE`.
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, Self::MAX_PER_PAGE),
        }
    }

    fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.per_page)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 10,
        }
    }
}

/// Accepts `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM:SS`, or a full RFC 3339 timestamp.
/// Dates without an offset are taken as UTC; bare dates mean midnight.
fn parse_date(s: &str) -> std::result::Result<DateTime<Utc>, QueryError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Ok(dt.and_utc());
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(dt) = d.and_hms_opt(0, 0, 0) {
            return Ok(dt.and_utc());
        }
    }
    Err(QueryError::InvalidDate(s.to_string()))
}

/// Stored timestamps use a fixed-width form so text comparison orders them.
fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn parse_video_row(row: &Row<'_>) -> rusqlite::Result<VideoMetadata> {
    let upload_date: String = row.get(8)?;
    let upload_date = DateTime::parse_from_rfc3339(&upload_date)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(VideoMetadata {
        id: VideoId::from(row.get::<_, String>(0)?),
        title: row.get(1)?,
        creator: row.get(2)?,
        description: row.get(3)?,
        video_filename: row.get(4)?,
        video_mime_type: row.get(5)?,
        cover_filename: row.get(6)?,
        cover_mime_type: row.get(7)?,
        upload_date,
    })
}

/// Register a video. Generates an id and upload date when not supplied.
pub fn create_video(conn: &Connection, new: &NewVideo) -> Result<VideoMetadata> {
    let id = new.id.clone().unwrap_or_default();
    let upload_date = new.upload_date.unwrap_or_else(Utc::now).trunc_subsecs(0);

    conn.execute(
        "INSERT INTO videos (id, title, creator, description, video_filename, video_mime_type,
                             cover_filename, cover_mime_type, upload_date)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            id.as_str(),
            new.title,
            new.creator,
            new.description,
            new.video_filename,
            new.video_mime_type,
            new.cover_filename,
            new.cover_mime_type,
            format_timestamp(&upload_date),
        ],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(ref err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Error::invalid_input(format!("Video already exists: {}", id))
        }
        _ => Error::database(e.to_string()),
    })?;

    Ok(VideoMetadata {
        id,
        title: new.title.clone(),
        creator: new.creator.clone(),
        description: new.description.clone(),
        video_filename: new.video_filename.clone(),
        video_mime_type: new.video_mime_type.clone(),
        cover_filename: new.cover_filename.clone(),
        cover_mime_type: new.cover_mime_type.clone(),
        upload_date,
    })
}

/// Get a video by ID.
pub fn get_video(conn: &Connection, id: &VideoId) -> Result<Option<VideoMetadata>> {
    match conn.query_row(
        &format!("{SELECT_COLUMNS} WHERE id = ?"),
        [id.as_str()],
        parse_video_row,
    ) {
        Ok(video) => Ok(Some(video)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// All video ids, in insertion order.
pub fn list_video_ids(conn: &Connection) -> Result<Vec<VideoId>> {
    let mut stmt = conn
        .prepare("SELECT id FROM videos ORDER BY rowid ASC")
        .map_err(|e| Error::database(e.to_string()))?;

    let ids = stmt
        .query_map([], |row| row.get::<_, String>(0).map(VideoId::from))
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(ids)
}

/// Delete a video. Returns whether a row was removed.
pub fn delete_video(conn: &Connection, id: &VideoId) -> Result<bool> {
    let affected = conn
        .execute("DELETE FROM videos WHERE id = ?", [id.as_str()])
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(affected > 0)
}

/// Bound values for a search's WHERE clause.
struct WhereClause {
    sql: String,
    title: Option<String>,
    creator: Option<String>,
    start: Option<String>,
    end: Option<String>,
}

impl WhereClause {
    fn new(query: &VideoQuery) -> Self {
        let mut sql = String::from(" WHERE 1=1");
        if query.title.is_some() {
            sql.push_str(" AND title LIKE :title ESCAPE '\\'");
        }
        if query.creator.is_some() {
            sql.push_str(" AND creator LIKE :creator ESCAPE '\\'");
        }
        if query.uploaded_between.is_some() {
            sql.push_str(" AND upload_date BETWEEN :start AND :end");
        }

        Self {
            sql,
            title: query.title.as_deref().map(like_pattern),
            creator: query.creator.as_deref().map(like_pattern),
            start: query.uploaded_between.map(|(s, _)| format_timestamp(&s)),
            end: query.uploaded_between.map(|(_, e)| format_timestamp(&e)),
        }
    }

    fn params(&self) -> Vec<(&str, &dyn ToSql)> {
        let mut params: Vec<(&str, &dyn ToSql)> = Vec::new();
        if let Some(ref title) = self.title {
            params.push((":title", title));
        }
        if let Some(ref creator) = self.creator {
            params.push((":creator", creator));
        }
        if let (Some(start), Some(end)) = (&self.start, &self.end) {
            params.push((":start", start));
            params.push((":end", end));
        }
        params
    }
}

/// Count videos matching a query.
pub fn count_videos(conn: &Connection, query: &VideoQuery) -> Result<u64> {
    let clause = WhereClause::new(query);
    let sql = format!("SELECT COUNT(*) FROM videos{}", clause.sql);

    conn.query_row(&sql, &*clause.params(), |row| row.get::<_, i64>(0))
        .map(|n| n.max(0) as u64)
        .map_err(|e| Error::database(e.to_string()))
}

/// Run a validated search and return the requested page.
///
/// A page past the end yields an empty item list, not an error.
pub fn search_videos(
    conn: &Connection,
    query: &VideoQuery,
    pagination: Pagination,
) -> Result<Page<VideoMetadata>> {
    let total = count_videos(conn, query)?;

    let clause = WhereClause::new(query);
    let direction = if query.descending { "DESC" } else { "ASC" };
    let sql = format!(
        "{SELECT_COLUMNS}{} ORDER BY {} {direction}, id ASC LIMIT :limit OFFSET :offset",
        clause.sql,
        query.sort.column(),
    );

    let limit = i64::from(pagination.per_page);
    let offset = i64::try_from(pagination.offset()).unwrap_or(i64::MAX);
    let mut params = clause.params();
    params.push((":limit", &limit));
    params.push((":offset", &offset));

    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| Error::database(e.to_string()))?;

    let videos = stmt
        .query_map(&*params, parse_video_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(Page::new(
        videos,
        total,
        pagination.page,
        pagination.per_page,
    ))
}
