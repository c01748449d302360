use itertools::Itertools;
use mime::Mime;
use serde::Serialize;

use crate::validate::label;

/// A file part received in a multipart form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub file_name: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: Some(file_name.into()),
            bytes: bytes.into(),
        }
    }

    pub fn kind(&self) -> Option<ImageKind> {
        ImageKind::detect(self)
    }

    /// Extension used when the file is written to storage.
    pub fn extension(&self) -> String {
        if let Some(kind) = self.kind() {
            return kind.extension().to_string();
        }
        self.file_name
            .as_deref()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or_else(|| "bin".to_string())
    }

    fn name_extension(&self) -> Option<String> {
        self.file_name
            .as_deref()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Gif,
    Bmp,
    Webp,
    Svg,
}

impl ImageKind {
    /// Sniffs the content. SVG has no magic number, so it needs an `.svg`
    /// name and `<svg` markup.
    pub fn detect(file: &UploadedFile) -> Option<ImageKind> {
        let sniffed = infer::get(&file.bytes).and_then(|kind| match kind.mime_type() {
            "image/jpeg" => Some(ImageKind::Jpeg),
            "image/png" => Some(ImageKind::Png),
            "image/gif" => Some(ImageKind::Gif),
            "image/bmp" => Some(ImageKind::Bmp),
            "image/webp" => Some(ImageKind::Webp),
            _ => None,
        });
        if sniffed.is_some() {
            return sniffed;
        }

        let is_svg_name = file.name_extension().as_deref() == Some("svg");
        if is_svg_name && has_svg_root(&String::from_utf8_lossy(&file.bytes)) {
            Some(ImageKind::Svg)
        } else {
            None
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpg",
            ImageKind::Png => "png",
            ImageKind::Gif => "gif",
            ImageKind::Bmp => "bmp",
            ImageKind::Webp => "webp",
            ImageKind::Svg => "svg",
        }
    }

    pub fn mime(self) -> Mime {
        match self {
            ImageKind::Jpeg => mime::IMAGE_JPEG,
            ImageKind::Png => mime::IMAGE_PNG,
            ImageKind::Gif => mime::IMAGE_GIF,
            ImageKind::Bmp => mime::IMAGE_BMP,
            ImageKind::Svg => mime::IMAGE_SVG,
            ImageKind::Webp => "image/webp".parse().unwrap_or(mime::IMAGE_STAR),
        }
    }

    /// Extensions accepted for this kind, in the order they are listed to users.
    fn extensions(self) -> &'static [&'static str] {
        match self {
            ImageKind::Jpeg => &["jpeg", "jpg"],
            ImageKind::Png => &["png"],
            ImageKind::Gif => &["gif"],
            ImageKind::Bmp => &["bmp"],
            ImageKind::Webp => &["webp"],
            ImageKind::Svg => &["svg"],
        }
    }
}

/// Skips the XML declaration, processing instructions, comments and the
/// doctype, then expects an `<svg` root element.
fn has_svg_root(text: &str) -> bool {
    let mut rest = text.trim_start_matches('\u{feff}');
    loop {
        rest = rest.trim_start();
        let end = if let Some(after) = rest.strip_prefix("<?") {
            after.find("?>").map(|i| 2 + i + 2)
        } else if let Some(after) = rest.strip_prefix("<!--") {
            after.find("-->").map(|i| 4 + i + 3)
        } else if rest
            .get(..9)
            .map_or(false, |head| head.eq_ignore_ascii_case("<!doctype"))
        {
            doctype_len(rest)
        } else {
            let Some(after) = rest.strip_prefix("<svg") else {
                return false;
            };
            return after.starts_with(|c: char| c.is_whitespace() || c == '>' || c == '/');
        };
        match end {
            Some(end) => rest = &rest[end..],
            None => return false,
        }
    }
}

/// Length of a doctype declaration, internal subset included.
fn doctype_len(decl: &str) -> Option<usize> {
    let close = decl.find('>')?;
    match decl.find('[') {
        Some(open) if open < close => {
            let subset_end = open + decl[open..].find(']')?;
            Some(subset_end + decl[subset_end..].find('>')? + 1)
        }
        _ => Some(close + 1),
    }
}

/// Accepted image kinds and the size limit for one file field.
#[derive(Debug, Clone, Copy)]
pub struct ImageRule {
    pub kinds: &'static [ImageKind],
    pub max_kilobytes: usize,
}

const ALL_KINDS: &[ImageKind] = &[
    ImageKind::Jpeg,
    ImageKind::Png,
    ImageKind::Gif,
    ImageKind::Bmp,
    ImageKind::Svg,
    ImageKind::Webp,
];

/// Club logo and staff photo at creation.
pub const CLUB_IMAGE: ImageRule = ImageRule {
    kinds: &[ImageKind::Jpeg, ImageKind::Png, ImageKind::Gif, ImageKind::Svg],
    max_kilobytes: 2048,
};

/// Largest size any image rule accepts.
pub const MAX_FILE_KILOBYTES: usize = 5120;

/// Replacement logo, staff photo and student photos.
pub const REPLACEMENT_IMAGE: ImageRule = ImageRule {
    kinds: ALL_KINDS,
    max_kilobytes: MAX_FILE_KILOBYTES,
};

pub const EVENT_IMAGE: ImageRule = ImageRule {
    kinds: &[ImageKind::Jpeg, ImageKind::Png, ImageKind::Gif],
    max_kilobytes: 2048,
};

impl ImageRule {
    /// Lists every broken constraint for `file`; empty when it passes.
    pub fn check(&self, field: &str, file: &UploadedFile) -> Vec<String> {
        let mut problems = Vec::new();

        match file.kind() {
            None => problems.push(format!("The {} must be an image.", label(field))),
            Some(kind) if !self.kinds.contains(&kind) => {
                problems.push(format!(
                    "The {} must be a file of type: {}.",
                    label(field),
                    self.accepted_extensions().join(", ")
                ));
            }
            Some(_) => {}
        }

        if file.bytes.len() > self.max_kilobytes * 1024 {
            problems.push(format!(
                "The {} must not be greater than {} kilobytes.",
                label(field),
                self.max_kilobytes
            ));
        }

        problems
    }

    pub fn accepted_extensions(&self) -> Vec<&'static str> {
        self.kinds
            .iter()
            .flat_map(|kind| kind.extensions().iter().copied())
            .collect()
    }

    /// Value for an HTML `accept` attribute.
    pub fn accept(&self) -> String {
        self.kinds.iter().map(|kind| kind.mime().to_string()).join(",")
    }

    pub fn summary(&self, required: bool) -> RuleSummary {
        RuleSummary {
            required,
            accept: self.accept(),
            extensions: self.accepted_extensions(),
            max_kilobytes: self.max_kilobytes,
        }
    }
}

/// What a form needs to know about a file field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSummary {
    pub required: bool,
    pub accept: String,
    pub extensions: Vec<&'static str>,
    pub max_kilobytes: usize,
}
