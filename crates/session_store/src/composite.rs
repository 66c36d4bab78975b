//! Settings built from several primitive values.

use std::path::{Path, PathBuf};

use crate::settings::{SettingsReader, SettingsWriter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontSpec {
    pub name: String,
    pub is_bold: bool,
    pub charset: i32,
    pub height: i32,
}

impl SettingsWriter {
    /// Stores `name`, `nameIsBold`, `nameCharSet` and `nameHeight`.
    pub fn set_font(&mut self, name: &str, font: &FontSpec) {
        self.set_str(name, &font.name);
        self.set_int(&format!("{name}IsBold"), i32::from(font.is_bold));
        self.set_int(&format!("{name}CharSet"), font.charset);
        self.set_int(&format!("{name}Height"), font.height);
    }

    pub fn set_filename(&mut self, name: &str, path: &Path) {
        self.set_str(name, &path.to_string_lossy());
    }
}

impl SettingsReader {
    /// All four parts must be present, otherwise the font is absent.
    #[must_use]
    pub fn get_font(&self, name: &str) -> Option<FontSpec> {
        let font_name = self.get_str(name)?;

        let is_bold = self.get_int(&format!("{name}IsBold"), -1);
        if is_bold == -1 {
            return None;
        }
        let charset = self.get_int(&format!("{name}CharSet"), -1);
        if charset == -1 {
            return None;
        }
        let height = self.get_int(&format!("{name}Height"), i32::MIN);
        if height == i32::MIN {
            return None;
        }

        Some(FontSpec {
            name: font_name,
            is_bold: is_bold != 0,
            charset,
            height,
        })
    }

    #[must_use]
    pub fn get_filename(&self, name: &str) -> Option<PathBuf> {
        self.get_str(name).map(PathBuf::from)
    }
}
