use std::fmt;

use crate::case::{Classification, Status};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const WHITE: Rgb = Rgb(0xff, 0xff, 0xff);
    pub const BLACK: Rgb = Rgb(0x00, 0x00, 0x00);

    /// SGR parameters selecting this color as the foreground.
    pub fn fg_code(self) -> String {
        format!("38;2;{};{};{}", self.0, self.1, self.2)
    }

    /// SGR parameters selecting this color as the background.
    pub fn bg_code(self) -> String {
        format!("48;2;{};{};{}", self.0, self.1, self.2)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

// Material Design swatches used by the dashboard.
const PINK_600: Rgb = Rgb(0xd8, 0x1b, 0x60);
const PINK_700: Rgb = Rgb(0xc2, 0x18, 0x5b);
const TEAL_400: Rgb = Rgb(0x26, 0xa6, 0x9a);
const TEAL_500: Rgb = Rgb(0x00, 0x96, 0x88);
const TEAL_600: Rgb = Rgb(0x00, 0x89, 0x7b);
const TEAL_700: Rgb = Rgb(0x00, 0x79, 0x6b);
const AMBER_700: Rgb = Rgb(0xff, 0xa0, 0x00);
const GREEN_700: Rgb = Rgb(0x38, 0x8e, 0x3c);
const RED_600: Rgb = Rgb(0xe5, 0x39, 0x35);
const RED_900: Rgb = Rgb(0xb7, 0x1c, 0x1c);
const BLUE_GREY_800: Rgb = Rgb(0x37, 0x47, 0x4f);
const GREY_50: Rgb = Rgb(0xfa, 0xfa, 0xfa);
const GREY_900: Rgb = Rgb(0x21, 0x21, 0x21);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaletteEntry {
    pub main: Rgb,
    pub contrast_text: Rgb,
}

impl PaletteEntry {
    const fn new(main: Rgb, contrast_text: Rgb) -> Self {
        Self {
            main,
            contrast_text,
        }
    }
}

impl Classification {
    pub fn palette(self) -> PaletteEntry {
        match self {
            Self::Imported => PaletteEntry::new(PINK_600, Rgb::WHITE),
            Self::ImportedCloseContact => PaletteEntry::new(PINK_700, Rgb::WHITE),
            Self::Local => PaletteEntry::new(TEAL_600, Rgb::WHITE),
            Self::LocalPossibly => PaletteEntry::new(TEAL_500, Rgb::WHITE),
            Self::LocalUnknownSource => PaletteEntry::new(TEAL_700, Rgb::WHITE),
            Self::LocalPossiblyCloseContact => PaletteEntry::new(TEAL_400, Rgb::WHITE),
            Self::LocalCloseContact => PaletteEntry::new(TEAL_500, Rgb::WHITE),
            Self::Unknown => PaletteEntry::new(GREY_900, Rgb::WHITE),
        }
    }
}

impl Status {
    pub fn palette(self) -> PaletteEntry {
        match self {
            Self::Hospitalised => PaletteEntry::new(AMBER_700, Rgb::BLACK),
            Self::Discharged => PaletteEntry::new(GREEN_700, Rgb::WHITE),
            Self::Serious => PaletteEntry::new(RED_600, Rgb::WHITE),
            Self::Critical => PaletteEntry::new(RED_900, Rgb::WHITE),
            Self::Deceased => PaletteEntry::new(BLUE_GREY_800, Rgb::WHITE),
            Self::Unknown => PaletteEntry::new(GREY_50, Rgb::BLACK),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecognised_keys_use_fallback_colors() {
        let classification = Classification::from("cruise_ship".to_string());
        assert_eq!(classification.palette().main.to_string(), "#212121");

        let status = Status::from("recovering".to_string());
        assert_eq!(status.palette().main.to_string(), "#fafafa");
        assert_eq!(status.palette().contrast_text, Rgb::BLACK);
    }

    #[test]
    fn hospitalised_uses_dark_text_on_amber() {
        let entry = Status::Hospitalised.palette();
        assert_eq!(entry.main.to_string(), "#ffa000");
        assert_eq!(entry.contrast_text, Rgb::BLACK);
    }

    #[test]
    fn sgr_codes_carry_channels() {
        assert_eq!(PINK_600.fg_code(), "38;2;216;27;96");
        assert_eq!(TEAL_500.bg_code(), "48;2;0;150;136");
    }
}
