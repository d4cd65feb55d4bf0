// photoprep/src/utils/mod.rs
use crate::core::{PhotoPrepError, Result};
use std::path::{Path, PathBuf};

/// Camera RAW extensions routed through the RAW converter.
pub const RAW_EXTENSIONS: [&str; 8] = ["nef", "nrw", "cr2", "cr3", "arw", "dng", "orf", "raf"];

const RASTER_EXTENSIONS: [&str; 2] = ["jpg", "jpeg"];

/// Local and web locations for a category's files.
///
/// The web path of a rendition is `/{web_root}/{year}/{category}/{scale}/{file}`,
/// where `category` is the last segment of the local photo directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoPaths {
    local_root: PathBuf,
    web_root: String,
    year: u16,
    category_segment: String,
}

impl PhotoPaths {
    pub fn new(local_root: impl Into<PathBuf>, web_root: &str, year: Option<u16>) -> Result<Self> {
        let local_root = local_root.into();

        let category_segment = local_root
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                PhotoPrepError::InvalidParameter(format!(
                    "Invalid local root path: {}",
                    local_root.display()
                ))
            })?
            .to_string();

        let year = match year.filter(|y| *y > 0) {
            Some(year) => year,
            None => infer_year(&local_root)?,
        };

        Ok(Self {
            local_root,
            web_root: format!("/{}", trim_web_separators(web_root)),
            year,
            category_segment,
        })
    }

    pub fn local_root(&self) -> &Path {
        &self.local_root
    }

    pub fn year(&self) -> u16 {
        self.year
    }

    pub fn scaled_local_path(&self, scale: &str, file_name: &str) -> PathBuf {
        self.local_root.join(scale).join(file_name)
    }

    pub fn scaled_web_path(&self, scale: &str, file_name: &str) -> String {
        let root = if self.web_root == "/" {
            ""
        } else {
            self.web_root.as_str()
        };

        format!(
            "{}/{}/{}/{}/{}",
            root, self.year, self.category_segment, scale, file_name
        )
    }
}

fn infer_year(local_root: &Path) -> Result<u16> {
    let parent = local_root
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            PhotoPrepError::InvalidParameter(format!(
                "Unable to infer year: {} has no year directory before the category",
                local_root.display()
            ))
        })?;

    parent
        .parse::<u16>()
        .ok()
        .filter(|y| *y > 0)
        .ok_or_else(|| {
            PhotoPrepError::InvalidParameter(format!(
                "Unable to infer year: '{}' is not a yyyy year in {}",
                parent,
                local_root.display()
            ))
        })
}

fn trim_web_separators(value: &str) -> &str {
    value.trim().trim_matches('/')
}

pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let base = 1024_f64;
    let bytes_f64 = bytes as f64;
    let exponent = ((bytes_f64.log10() / base.log10()).floor() as usize).min(UNITS.len() - 1);
    let size = bytes_f64 / base.powi(exponent as i32);

    format!("{:.2} {}", size, UNITS[exponent])
}

pub fn get_file_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_lowercase())
}

pub fn is_raw_file(path: &Path) -> bool {
    get_file_extension(path)
        .map(|ext| RAW_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Photo files a batch picks up: JPEGs and camera RAW files.
pub fn is_supported_format(path: &Path) -> bool {
    get_file_extension(path)
        .map(|ext| RASTER_EXTENSIONS.contains(&ext.as_str()) || RAW_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

pub fn file_name_string(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// File name a rendition of `source` is written under. RAW sources become `.jpg`.
pub fn rendition_file_name(source: &Path) -> String {
    if is_raw_file(source) {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "photo".to_string());
        format!("{stem}.jpg")
    } else {
        file_name_string(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn web_path_uses_year_and_category() {
        let paths = PhotoPaths::new("/photos/2024/summer_trip", "/images/", Some(2024)).unwrap();
        assert_eq!(
            paths.scaled_web_path("md", "DSC_0001.jpg"),
            "/images/2024/summer_trip/md/DSC_0001.jpg"
        );
        assert_eq!(
            paths.scaled_local_path("xs", "DSC_0001.jpg"),
            PathBuf::from("/photos/2024/summer_trip/xs/DSC_0001.jpg")
        );
    }

    #[test]
    fn year_is_inferred_from_parent_directory() {
        let paths = PhotoPaths::new("/photos/2019/snow", "images", None).unwrap();
        assert_eq!(paths.year(), 2019);
        assert_eq!(paths.scaled_web_path("src", "a.nef"), "/images/2019/snow/src/a.nef");
    }

    #[test]
    fn year_inference_fails_without_year_segment() {
        assert!(PhotoPaths::new("/photos/misc/snow", "images", None).is_err());
    }

    #[test]
    fn empty_web_root_does_not_double_slash() {
        let paths = PhotoPaths::new("/photos/2020/beach", " / ", Some(2020)).unwrap();
        assert_eq!(paths.scaled_web_path("lg", "a.jpg"), "/2020/beach/lg/a.jpg");
    }

    #[test]
    fn raw_and_jpeg_are_supported() {
        assert!(is_supported_format(Path::new("a.JPG")));
        assert!(is_supported_format(Path::new("a.nef")));
        assert!(!is_supported_format(Path::new("a.png")));
        assert!(!is_supported_format(Path::new("notes.txt")));
        assert!(is_raw_file(Path::new("DSC_1.NEF")));
        assert!(!is_raw_file(Path::new("DSC_1.jpg")));
    }

    #[test]
    fn raw_renditions_are_jpegs() {
        assert_eq!(rendition_file_name(Path::new("/a/DSC_1.NEF")), "DSC_1.jpg");
        assert_eq!(rendition_file_name(Path::new("/a/DSC_1.jpg")), "DSC_1.jpg");
    }

    #[test]
    fn human_sizes() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(1536), "1.50 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5.00 MB");
    }
}
