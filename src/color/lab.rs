use image::Rgb;
use palette::color_difference::Ciede2000;
use palette::{FromColor, Lab, Srgb};
use serde::Deserialize;

/// Convert an 8-bit sRGB pixel to CIE L*a*b* (D65).
pub fn lab_from_rgb(px: Rgb<u8>) -> Lab {
    let srgb: Srgb<f32> = Srgb::new(px[0], px[1], px[2]).into_format();
    Lab::from_color(srgb)
}

/// Formula used to measure the distance between two Lab colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaEFormula {
    /// Euclidean distance in Lab.
    #[default]
    Cie76,
    Ciede2000,
}

impl DeltaEFormula {
    pub fn difference(self, lhs: Lab, rhs: Lab) -> f64 {
        match self {
            DeltaEFormula::Cie76 => {
                let dl = lhs.l - rhs.l;
                let da = lhs.a - rhs.a;
                let db = lhs.b - rhs.b;
                f64::from((dl * dl + da * da + db * db).sqrt())
            }
            DeltaEFormula::Ciede2000 => f64::from(lhs.difference(rhs)),
        }
    }
}
