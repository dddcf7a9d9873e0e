use image::Rgb;

/// Hue is stored in half-degrees, so the wheel spans `0..HUE_RANGE`.
pub const HUE_RANGE: f64 = 180.0;

/// Fixed-point precision of OpenCV's 8-bit HSV conversion.
const HSV_SHIFT: u32 = 12;
const HSV_HALF: i32 = 1 << (HSV_SHIFT - 1);

/// `round((255 << 12) / v)`, with entry 0 left at 0.
const SATURATION_DIV: [i32; 256] = div_table(255 << HSV_SHIFT, 1);
/// `round((180 << 12) / (6 * diff))`, with entry 0 left at 0.
const HUE_DIV: [i32; 256] = div_table((HUE_RANGE as i32) << HSV_SHIFT, 6);

const fn div_table(numerator: i32, scale: i32) -> [i32; 256] {
    let mut table = [0; 256];
    let mut i = 1;
    while i < 256 {
        let denominator = scale * i as i32;
        // None of these quotients lands on an exact half.
        table[i] = (2 * numerator + denominator) / (2 * denominator);
        i += 1;
    }
    table
}

/// 8-bit hue/saturation/brightness, bit-exact with OpenCV's `RGB2HSV` on
/// `u8` data: hue in `0..180`, saturation and brightness in `0..=255`.
///
/// OpenCV divides through fixed-point reciprocal tables rather than rounding
/// the exact quotient, which moves a few percent of hues by one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hsb {
    pub hue: u8,
    pub saturation: u8,
    pub brightness: u8,
}

impl Hsb {
    pub fn from_rgb(px: Rgb<u8>) -> Self {
        let [r, g, b] = px.0.map(i32::from);
        let v = r.max(g).max(b);
        let diff = v - r.min(g).min(b);

        let saturation = (diff * SATURATION_DIV[v as usize] + HSV_HALF) >> HSV_SHIFT;

        // 60 degrees per sextant, halved.
        let sextant = if v == r {
            g - b
        } else if v == g {
            b - r + 2 * diff
        } else {
            r - g + 4 * diff
        };
        // Arithmetic shift, so negative hues floor like the C original.
        let mut hue = (sextant * HUE_DIV[diff as usize] + HSV_HALF) >> HSV_SHIFT;
        if hue < 0 {
            hue += HUE_RANGE as i32;
        }

        Self {
            hue: hue as u8,
            saturation: saturation as u8,
            brightness: v as u8,
        }
    }
}

/// Per-channel means of [`Hsb`] values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HsbMean {
    pub hue: f64,
    pub saturation: f64,
    pub brightness: f64,
}

impl From<Hsb> for HsbMean {
    fn from(hsb: Hsb) -> Self {
        Self {
            hue: f64::from(hsb.hue),
            saturation: f64::from(hsb.saturation),
            brightness: f64::from(hsb.brightness),
        }
    }
}
