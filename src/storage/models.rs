use std::cmp::Ordering;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status written on records created by the upload pipeline.
pub const STATUS_COMPLETE: &str = "complete";

/// One entry of the upload log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: u64,
    /// Generated name of the payload in file storage
    pub file_name: String,
    /// Client-supplied name after encoding correction
    pub original_name: String,
    /// Extension of `file_name` without the leading dot
    pub file_type: String,
    pub upload_date: DateTime<Utc>,
    pub file_size: u64,
    pub uploader_name: String,
    pub status: String,
}

/// Field-level overrides for an existing record. `None` keeps the old value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileUpdate {
    pub file_name: Option<String>,
    pub file_size: Option<u64>,
    pub file_type: Option<String>,
    pub original_name: Option<String>,
    pub status: Option<String>,
    pub upload_date: Option<DateTime<Utc>>,
}

impl FileUpdate {
    pub fn is_empty(&self) -> bool {
        *self == FileUpdate::default()
    }

    pub fn apply(self, record: &mut FileRecord) {
        if let Some(v) = self.file_name {
            record.file_name = v;
        }
        if let Some(v) = self.file_size {
            record.file_size = v;
        }
        if let Some(v) = self.file_type {
            record.file_type = v;
        }
        if let Some(v) = self.original_name {
            record.original_name = v;
        }
        if let Some(v) = self.status {
            record.status = v;
        }
        if let Some(v) = self.upload_date {
            record.upload_date = v;
        }
    }
}

/// Fields the file list can be ordered by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortField {
    #[default]
    Id,
    FileName,
    FileSize,
    FileType,
    OriginalName,
    Status,
    UploadDate,
    UploaderName,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "id" => Ok(SortField::Id),
            "fileName" => Ok(SortField::FileName),
            "fileSize" => Ok(SortField::FileSize),
            "fileType" => Ok(SortField::FileType),
            "originalName" => Ok(SortField::OriginalName),
            "status" => Ok(SortField::Status),
            "uploadDate" => Ok(SortField::UploadDate),
            "uploaderName" => Ok(SortField::UploaderName),
            other => Err(format!("cannot sort by '{other}'")),
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => Err(format!("sort order must be 'asc' or 'desc', got '{s}'")),
        }
    }
}

impl SortField {
    /// Total order on records for this field. Numeric fields compare as numbers,
    /// dates chronologically and text byte-wise; ties fall back to `id`.
    pub fn compare(self, a: &FileRecord, b: &FileRecord) -> Ordering {
        let primary = match self {
            SortField::Id => a.id.cmp(&b.id),
            SortField::FileName => a.file_name.cmp(&b.file_name),
            SortField::FileSize => a.file_size.cmp(&b.file_size),
            SortField::FileType => a.file_type.cmp(&b.file_type),
            SortField::OriginalName => a.original_name.cmp(&b.original_name),
            SortField::Status => a.status.cmp(&b.status),
            SortField::UploadDate => a.upload_date.cmp(&b.upload_date),
            SortField::UploaderName => a.uploader_name.cmp(&b.uploader_name),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }
}

/// Sort and pagination parameters for a list query. `page` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageQuery {
    pub page: u32,
    pub per_page: u32,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
}

/// One page of the sorted upload log.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub files: Vec<FileRecord>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
}

impl Page {
    /// Sort `records` and cut out the requested page. With `clamp` the page is
    /// pulled back into `1..=max(total_pages, 1)`.
    pub fn build(mut records: Vec<FileRecord>, query: PageQuery, clamp: bool) -> Self {
        let per_page = query.per_page.max(1);
        records.sort_by(|a, b| match query.sort_order {
            SortOrder::Asc => query.sort_by.compare(a, b),
            SortOrder::Desc => query.sort_by.compare(b, a),
        });

        let total = records.len() as u64;
        let total_pages = total.div_ceil(per_page as u64) as u32;

        let mut page = query.page.max(1);
        if clamp && page > total_pages {
            page = total_pages.max(1);
        }

        let start = (page as usize - 1).saturating_mul(per_page as usize);
        let files = records
            .into_iter()
            .skip(start)
            .take(per_page as usize)
            .collect();

        Page {
            files,
            total,
            page,
            per_page,
            total_pages,
        }
    }
}
