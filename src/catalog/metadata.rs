use std::fs::File;

use lofty::file::TaggedFileExt;
use lofty::tag::ItemKey;

use crate::error::MetadataError;

/// Descriptive tags read from an audio container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFields {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub year: Option<u32>,
    pub track_number: Option<u32>,
}

/// Reads tags from an open file.
pub trait MetadataReader: Send + Sync {
    fn read(&self, file: &mut File) -> Result<TagFields, MetadataError>;
}

/// Tag reader backed by `lofty`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoftyReader;

impl MetadataReader for LoftyReader {
    fn read(&self, file: &mut File) -> Result<TagFields, MetadataError> {
        let tagged = lofty::read_from(file).map_err(|e| MetadataError::Read(e.to_string()))?;

        let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) else {
            return Ok(TagFields::default());
        };

        let text = |key: ItemKey| {
            tag.get_string(&key)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        Ok(TagFields {
            title: text(ItemKey::TrackTitle),
            artist: text(ItemKey::TrackArtist),
            album: text(ItemKey::AlbumTitle),
            genre: text(ItemKey::Genre),
            year: text(ItemKey::Year)
                .or_else(|| text(ItemKey::RecordingDate))
                .and_then(|v| leading_number(&v)),
            track_number: text(ItemKey::TrackNumber).and_then(|v| leading_number(&v)),
        })
    }
}

/// Parse the leading run of digits: "2004-05-01" -> 2004, "3/12" -> 3.
fn leading_number(s: &str) -> Option<u32> {
    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok().filter(|n| *n != 0)
}
