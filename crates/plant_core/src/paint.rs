//! Paint mixtures: five base paints measured in litres.
//!
//! Tank level is the total volume of its mixture; the displayed colour is the
//! volume-weighted average of the base paints' RGB values.

use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseColor {
    Cyan,
    Magenta,
    Yellow,
    Black,
    White,
}

impl BaseColor {
    pub const ALL: [BaseColor; 5] = [
        BaseColor::Cyan,
        BaseColor::Magenta,
        BaseColor::Yellow,
        BaseColor::Black,
        BaseColor::White,
    ];

    /// RGB of the pure base paint, derived from its CMYK coordinates.
    pub fn rgb(self) -> Rgb {
        match self {
            BaseColor::Cyan => Rgb::from_cmyk(1.0, 0.0, 0.0, 0.0),
            BaseColor::Magenta => Rgb::from_cmyk(0.0, 1.0, 0.0, 0.0),
            BaseColor::Yellow => Rgb::from_cmyk(0.0, 0.0, 1.0, 0.0),
            BaseColor::Black => Rgb::from_cmyk(0.0, 0.0, 0.0, 1.0),
            BaseColor::White => Rgb::from_cmyk(0.0, 0.0, 0.0, 0.0),
        }
    }
}

impl std::fmt::Display for BaseColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            BaseColor::Cyan => "cyan",
            BaseColor::Magenta => "magenta",
            BaseColor::Yellow => "yellow",
            BaseColor::Black => "black",
            BaseColor::White => "white",
        };
        f.write_str(label)
    }
}

/// Colour with channels nominally in `0.0..=255.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Rgb {
    /// Reading reported by a colour sensor that fails out of range.
    pub const OUT_OF_RANGE: Rgb = Rgb {
        r: -1.0,
        g: -1.0,
        b: -1.0,
    };

    pub fn from_cmyk(c: f64, m: f64, y: f64, k: f64) -> Self {
        Self {
            r: 255.0 * (1.0 - c) * (1.0 - k),
            g: 255.0 * (1.0 - m) * (1.0 - k),
            b: 255.0 * (1.0 - y) * (1.0 - k),
        }
    }

    pub fn is_valid(&self) -> bool {
        [self.r, self.g, self.b]
            .iter()
            .all(|c| c.is_finite() && (0.0..=255.0).contains(c))
    }

    /// `#rrggbb`, channels clamped and rounded.
    pub fn to_hex(&self) -> String {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let channel = |c: f64| c.clamp(0.0, 255.0).round() as u8;
        format!(
            "#{:02x}{:02x}{:02x}",
            channel(self.r),
            channel(self.g),
            channel(self.b)
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaintMixture {
    pub cyan: f64,
    pub magenta: f64,
    pub yellow: f64,
    pub black: f64,
    pub white: f64,
}

impl PaintMixture {
    pub const EMPTY: PaintMixture = PaintMixture {
        cyan: 0.0,
        magenta: 0.0,
        yellow: 0.0,
        black: 0.0,
        white: 0.0,
    };

    pub fn pure(color: BaseColor, litres: f64) -> Self {
        let mut mixture = Self::EMPTY;
        *mixture.amount_mut(color) = litres.max(0.0);
        mixture
    }

    pub fn amount(&self, color: BaseColor) -> f64 {
        match color {
            BaseColor::Cyan => self.cyan,
            BaseColor::Magenta => self.magenta,
            BaseColor::Yellow => self.yellow,
            BaseColor::Black => self.black,
            BaseColor::White => self.white,
        }
    }

    fn amount_mut(&mut self, color: BaseColor) -> &mut f64 {
        match color {
            BaseColor::Cyan => &mut self.cyan,
            BaseColor::Magenta => &mut self.magenta,
            BaseColor::Yellow => &mut self.yellow,
            BaseColor::Black => &mut self.black,
            BaseColor::White => &mut self.white,
        }
    }

    pub fn volume(&self) -> f64 {
        self.cyan + self.magenta + self.yellow + self.black + self.white
    }

    pub fn is_empty(&self) -> bool {
        self.volume() <= 0.0
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            cyan: self.cyan * factor,
            magenta: self.magenta * factor,
            yellow: self.yellow * factor,
            black: self.black * factor,
            white: self.white * factor,
        }
    }

    /// Removes a proportional slice of `litres` and returns it. Takes at most
    /// what is present, so the remainder never goes negative.
    pub fn take(&mut self, litres: f64) -> PaintMixture {
        let volume = self.volume();
        if volume <= 0.0 || litres <= 0.0 {
            return Self::EMPTY;
        }
        if litres >= volume {
            return std::mem::take(self);
        }
        let slice = self.scaled(litres / volume);
        for color in BaseColor::ALL {
            let remaining = (self.amount(color) - slice.amount(color)).max(0.0);
            *self.amount_mut(color) = remaining;
        }
        slice
    }

    /// Scales the mixture down to `capacity` if it exceeds it. Returns the
    /// spilled volume.
    pub fn clamp_to(&mut self, capacity: f64) -> f64 {
        let volume = self.volume();
        if volume <= capacity {
            return 0.0;
        }
        *self = self.scaled(capacity / volume);
        volume - capacity
    }

    /// Volume-weighted average of the base colours; `None` when empty.
    pub fn color(&self) -> Option<Rgb> {
        let volume = self.volume();
        if volume <= 0.0 {
            return None;
        }
        let mut mixed = Rgb {
            r: 0.0,
            g: 0.0,
            b: 0.0,
        };
        for color in BaseColor::ALL {
            let weight = self.amount(color) / volume;
            let base = color.rgb();
            mixed.r += weight * base.r;
            mixed.g += weight * base.g;
            mixed.b += weight * base.b;
        }
        Some(mixed)
    }
}

impl Add for PaintMixture {
    type Output = PaintMixture;

    fn add(self, rhs: PaintMixture) -> PaintMixture {
        PaintMixture {
            cyan: self.cyan + rhs.cyan,
            magenta: self.magenta + rhs.magenta,
            yellow: self.yellow + rhs.yellow,
            black: self.black + rhs.black,
            white: self.white + rhs.white,
        }
    }
}

impl AddAssign for PaintMixture {
    fn add_assign(&mut self, rhs: PaintMixture) {
        *self = *self + rhs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pure_base_colors_have_expected_rgb() {
        assert_eq!(BaseColor::Cyan.rgb().to_hex(), "#00ffff");
        assert_eq!(BaseColor::Magenta.rgb().to_hex(), "#ff00ff");
        assert_eq!(BaseColor::Yellow.rgb().to_hex(), "#ffff00");
        assert_eq!(BaseColor::Black.rgb().to_hex(), "#000000");
        assert_eq!(BaseColor::White.rgb().to_hex(), "#ffffff");
    }

    #[test]
    fn empty_mixture_has_no_color() {
        assert!(PaintMixture::EMPTY.color().is_none());
        assert!(PaintMixture::EMPTY.is_empty());
    }

    #[test]
    fn color_is_volume_weighted_average() {
        let mixture = PaintMixture::pure(BaseColor::Black, 30.0)
            + PaintMixture::pure(BaseColor::White, 10.0);
        let rgb = mixture.color().unwrap();
        assert!((rgb.r - 63.75).abs() < 1e-9);
        assert!((rgb.g - 63.75).abs() < 1e-9);
        assert!((rgb.b - 63.75).abs() < 1e-9);
    }

    #[test]
    fn take_is_proportional_and_bounded() {
        let mut mixture = PaintMixture::pure(BaseColor::Cyan, 30.0)
            + PaintMixture::pure(BaseColor::Yellow, 10.0);
        let slice = mixture.take(20.0);
        assert!((slice.cyan - 15.0).abs() < 1e-9);
        assert!((slice.yellow - 5.0).abs() < 1e-9);
        assert!((mixture.volume() - 20.0).abs() < 1e-9);

        let rest = mixture.take(1_000.0);
        assert!((rest.volume() - 20.0).abs() < 1e-9);
        assert!(mixture.is_empty());
    }

    #[test]
    fn clamp_scales_down_and_reports_spill() {
        let mut mixture = PaintMixture::pure(BaseColor::Magenta, 80.0)
            + PaintMixture::pure(BaseColor::White, 40.0);
        let spilled = mixture.clamp_to(100.0);
        assert!((spilled - 20.0).abs() < 1e-9);
        assert!((mixture.volume() - 100.0).abs() < 1e-9);
        assert!((mixture.magenta / mixture.white - 2.0).abs() < 1e-9);
    }

    #[test]
    fn out_of_range_color_is_invalid() {
        assert!(!Rgb::OUT_OF_RANGE.is_valid());
        assert!(BaseColor::White.rgb().is_valid());
    }
}
