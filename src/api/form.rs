use axum::{
    extract::{multipart::Field, ContentLengthLimit, Multipart},
    http::StatusCode,
};
use std::collections::{BTreeMap, HashMap};

use crate::{
    error::{AppError, AppResult},
    service::StudentCoordinatorInput,
    upload::{UploadedFile, MAX_FILE_KILOBYTES},
};

/// Upper bound of a whole form body, room for several full-size images.
pub const MAX_BODY_BYTES: u64 = 32 * 1024 * 1024;

/// Forms without a `Content-Length` or above [`MAX_BODY_BYTES`] are refused
/// before any of the body is read.
pub type LimitedMultipart = ContentLengthLimit<Multipart, MAX_BODY_BYTES>;

const MAX_FIELD_BYTES: usize = MAX_FILE_KILOBYTES * 1024;

/// A multipart body split into text fields and file fields.
///
/// Text is trimmed and blank text counts as missing. File inputs submitted
/// without a file (no name or no content) count as missing too.
#[derive(Debug, Default)]
pub struct MultipartForm {
    text: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

fn bad_request(e: impl std::fmt::Display) -> AppError {
    AppError::from(
        StatusCode::BAD_REQUEST,
        format!("failed to read multipart form: {e}"),
    )
}

/// Reads at most one byte past [`MAX_FIELD_BYTES`]. The remainder of a longer
/// field is skipped by the next `next_field` call. Returns whether it was cut.
async fn read_capped(field: &mut Field<'_>) -> AppResult<(Vec<u8>, bool)> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.chunk().await.map_err(bad_request)? {
        bytes.extend_from_slice(&chunk);
        if bytes.len() > MAX_FIELD_BYTES {
            bytes.truncate(MAX_FIELD_BYTES + 1);
            return Ok((bytes, true));
        }
    }
    Ok((bytes, false))
}

/// `students[3][name]` -> `(3, "name")`
fn student_key(name: &str) -> Option<(usize, &str)> {
    let rest = name.strip_prefix("students[")?;
    let (index, rest) = rest.split_once("][")?;
    let field = rest.strip_suffix(']')?;
    Some((index.parse().ok()?, field))
}

impl MultipartForm {
    pub async fn read(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = Self::default();

        while let Some(mut field) = multipart.next_field().await.map_err(bad_request)? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            let file_name = field.file_name().map(str::to_string);
            // an oversized file keeps just enough bytes to fail its size rule
            let (bytes, cut) = read_capped(&mut field).await?;

            match file_name {
                Some(file_name) => {
                    if !file_name.is_empty() && !bytes.is_empty() {
                        form.files.insert(name, UploadedFile::new(file_name, bytes));
                    }
                }
                None => {
                    if cut {
                        return Err(bad_request(format!("field `{name}` is too large")));
                    }
                    let text = String::from_utf8(bytes)
                        .map_err(|_| bad_request(format!("field `{name}` is not utf-8")))?;
                    form.insert_text(name, text);
                }
            }
        }

        Ok(form)
    }

    pub fn insert_text(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.text.insert(name.into(), value.into());
    }

    pub fn insert_file(&mut self, name: impl Into<String>, file: UploadedFile) {
        self.files.insert(name.into(), file);
    }

    pub fn text(&mut self, name: &str) -> Option<String> {
        self.text
            .remove(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    pub fn file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }

    /// Collects `students[N][id|name|photo]` fields ordered by `N`.
    pub fn students(&mut self) -> Vec<StudentCoordinatorInput> {
        let mut entries = BTreeMap::<usize, StudentCoordinatorInput>::new();

        let text_keys: Vec<String> = self
            .text
            .keys()
            .filter(|key| student_key(key).is_some())
            .cloned()
            .collect();
        for key in text_keys {
            let Some((index, field)) = student_key(&key) else {
                continue;
            };
            let entry = entries.entry(index).or_default();
            match field {
                "id" => entry.id = self.text(&key),
                "name" => entry.name = self.text(&key),
                _ => {}
            }
        }

        let file_keys: Vec<String> = self
            .files
            .keys()
            .filter(|key| matches!(student_key(key), Some((_, "photo"))))
            .cloned()
            .collect();
        for key in file_keys {
            if let Some((index, _)) = student_key(&key) {
                let photo = self.file(&key);
                entries.entry(index).or_default().photo = photo;
            }
        }

        entries.into_values().collect()
    }
}
