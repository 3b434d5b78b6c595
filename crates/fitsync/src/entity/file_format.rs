//! Activity media file formats.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Activity file formats moved between platforms.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum FileFormat {
    /// Garmin FIT (binary).
    #[sea_orm(string_value = "fit")]
    Fit,
    /// Training Center XML.
    #[sea_orm(string_value = "tcx")]
    Tcx,
    /// GPS Exchange format.
    #[sea_orm(string_value = "gpx")]
    Gpx,
}

impl FileFormat {
    /// Default transfer preference, richest format first.
    pub const PREFERENCE: [FileFormat; 3] = [FileFormat::Fit, FileFormat::Tcx, FileFormat::Gpx];

    /// File extension without the leading dot.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            FileFormat::Fit => "fit",
            FileFormat::Tcx => "tcx",
            FileFormat::Gpx => "gpx",
        }
    }

    /// Parse from a file extension (case-insensitive, leading dot allowed).
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "fit" => Some(FileFormat::Fit),
            "tcx" => Some(FileFormat::Tcx),
            "gpx" => Some(FileFormat::Gpx),
            _ => None,
        }
    }
}

impl std::fmt::Display for FileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

impl std::str::FromStr for FileFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s).ok_or_else(|| format!("Unknown file format: {}", s))
    }
}
