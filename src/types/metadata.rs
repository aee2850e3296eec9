//! Media item metadata as returned by a fetcher.
//!
//! The scheduler treats [`Metadata`] as an opaque value. The helpers here
//! exist for presentation code that wants size and time estimates for a
//! chosen format.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A preview image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thumbnail {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl Thumbnail {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            width: None,
            height: None,
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    fn area(&self) -> u64 {
        u64::from(self.width.unwrap_or(0)) * u64::from(self.height.unwrap_or(0))
    }
}

/// One downloadable encoding of an item.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Format {
    pub format_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vcodec: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acodec: Option<String>,
    /// Total bitrate in kbit/s.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tbr: Option<f64>,
    /// Exact size in bytes, when the provider knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filesize: Option<u64>,
    /// Provider's own estimate in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filesize_approx: Option<u64>,
}

impl Format {
    pub fn new(format_id: impl Into<String>) -> Self {
        Self {
            format_id: format_id.into(),
            ..Default::default()
        }
    }

    /// Best available size estimate in bytes.
    ///
    /// Prefers the exact size, then the provider's approximation, then
    /// `tbr * duration / 8`.
    pub fn estimated_size(&self, duration: Option<Duration>) -> Option<u64> {
        if let Some(size) = self.filesize.or(self.filesize_approx) {
            return Some(size);
        }
        let kbps = self.tbr.filter(|t| *t > 0.0)?;
        let secs = duration?.as_secs_f64();
        Some((kbps * 1000.0 / 8.0 * secs).round() as u64)
    }

    /// Whether the format carries a video stream.
    pub fn has_video(&self) -> bool {
        self.vcodec.as_deref().is_some_and(|c| c != "none")
    }
}

/// Rich metadata for a media item.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Metadata {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploader: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webpage_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub thumbnails: Vec<Thumbnail>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub formats: Vec<Format>,
}

impl Metadata {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_duration(mut self, secs: f64) -> Self {
        self.duration_secs = Some(secs);
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: Thumbnail) -> Self {
        self.thumbnails.push(thumbnail);
        self
    }

    pub fn with_format(mut self, format: Format) -> Self {
        self.formats.push(format);
        self
    }

    /// Declared duration. `None` when absent, negative, NaN or too large
    /// to represent.
    pub fn duration(&self) -> Option<Duration> {
        self.duration_secs
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }

    /// Largest thumbnail by pixel area; falls back to the last one listed
    /// when no dimensions are known (providers list them small to large).
    pub fn best_thumbnail(&self) -> Option<&Thumbnail> {
        self.thumbnails
            .iter()
            .enumerate()
            .max_by_key(|(i, t)| (t.area(), *i))
            .map(|(_, t)| t)
    }

    /// Tallest video format not exceeding `max_height`.
    pub fn format_for_height(&self, max_height: u32) -> Option<&Format> {
        self.formats
            .iter()
            .filter(|f| f.has_video())
            .filter(|f| f.height.is_some_and(|h| h <= max_height))
            .max_by(|a, b| {
                a.height
                    .cmp(&b.height)
                    .then(a.tbr.unwrap_or(0.0).total_cmp(&b.tbr.unwrap_or(0.0)))
            })
    }
}

/// Time to transfer `bytes` at `bytes_per_sec`. `None` for a zero rate or
/// an estimate beyond `Duration::MAX`.
pub fn estimate_download_time(bytes: u64, bytes_per_sec: u64) -> Option<Duration> {
    if bytes_per_sec == 0 {
        return None;
    }
    Duration::try_from_secs_f64(bytes as f64 / bytes_per_sec as f64).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(id: &str, height: u32, tbr: f64) -> Format {
        Format {
            height: Some(height),
            tbr: Some(tbr),
            vcodec: Some("avc1".into()),
            ..Format::new(id)
        }
    }

    #[test]
    fn estimated_size_prefers_exact() {
        let f = Format {
            filesize: Some(1_000),
            filesize_approx: Some(2_000),
            tbr: Some(800.0),
            ..Format::new("22")
        };
        assert_eq!(f.estimated_size(Some(Duration::from_secs(10))), Some(1_000));
    }

    #[test]
    fn estimated_size_from_bitrate() {
        // 800 kbit/s for 10s = 1,000,000 bytes
        let f = Format {
            tbr: Some(800.0),
            ..Format::new("18")
        };
        assert_eq!(
            f.estimated_size(Some(Duration::from_secs(10))),
            Some(1_000_000)
        );
        assert_eq!(f.estimated_size(None), None);
    }

    #[test]
    fn format_for_height_picks_tallest_fit() {
        let meta = Metadata::new("abc", "t")
            .with_format(video("360", 360, 500.0))
            .with_format(video("720", 720, 2500.0))
            .with_format(video("1080", 1080, 4500.0))
            .with_format(Format {
                acodec: Some("opus".into()),
                vcodec: Some("none".into()),
                ..Format::new("audio")
            });
        assert_eq!(meta.format_for_height(720).unwrap().format_id, "720");
        assert_eq!(meta.format_for_height(1440).unwrap().format_id, "1080");
        assert!(meta.format_for_height(240).is_none());
    }

    #[test]
    fn best_thumbnail_by_area() {
        let meta = Metadata::new("abc", "t")
            .with_thumbnail(Thumbnail::new("small").with_size(120, 90))
            .with_thumbnail(Thumbnail::new("large").with_size(1280, 720))
            .with_thumbnail(Thumbnail::new("medium").with_size(480, 360));
        assert_eq!(meta.best_thumbnail().unwrap().url, "large");
    }

    #[test]
    fn download_time() {
        assert_eq!(
            estimate_download_time(10_000, 1_000),
            Some(Duration::from_secs(10))
        );
        assert_eq!(estimate_download_time(10_000, 0), None);
    }

    #[test]
    fn download_time_beyond_duration_max_is_none() {
        assert_eq!(estimate_download_time(u64::MAX, 1), None);
    }

    #[test]
    fn unrepresentable_durations_are_none() {
        let meta: Metadata =
            serde_json::from_str(r#"{"id":"abc","title":"t","duration_secs":1e30}"#).unwrap();
        assert_eq!(meta.duration(), None);
        assert_eq!(Metadata::new("a", "t").with_duration(-5.0).duration(), None);
        assert_eq!(Metadata::new("a", "t").with_duration(f64::NAN).duration(), None);
        assert_eq!(
            Metadata::new("a", "t").with_duration(90.5).duration(),
            Some(Duration::from_millis(90_500))
        );
    }

    #[test]
    fn huge_duration_does_not_break_size_estimate() {
        let meta = Metadata::new("a", "t").with_duration(1e30);
        let format = Format {
            tbr: Some(800.0),
            ..Format::new("18")
        };
        assert_eq!(format.estimated_size(meta.duration()), None);
    }

    #[test]
    fn deserializes_sparse_json() {
        let meta: Metadata = serde_json::from_str(r#"{"id":"abc","title":"Hello"}"#).unwrap();
        assert_eq!(meta.title, "Hello");
        assert!(meta.formats.is_empty());
    }
}
