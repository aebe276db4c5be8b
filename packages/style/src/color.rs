//! Color space conversion.
//!
//! Every conversion goes through gamma-encoded sRGB. Channel precision may be
//! lost on the way, alpha never is.

use crate::value::{Color, ColorSpace};

/// Convert a color into `target`.
///
/// Alpha is carried over exactly. If the math produces a non-finite channel the
/// input is returned unchanged.
pub fn convert_color_space(color: &Color, target: ColorSpace) -> Color {
    if color.color_space == target {
        return color.clone();
    }

    match try_convert(color, target) {
        Some(channels) if channels.iter().all(|c| c.is_finite()) => Color {
            color_space: target,
            channels,
            alpha: color.alpha,
        },
        _ => color.clone(),
    }
}

fn try_convert(color: &Color, target: ColorSpace) -> Option<[f64; 3]> {
    if !color.channels.iter().all(|c| c.is_finite()) {
        return None;
    }
    let srgb = to_srgb(color.color_space, color.channels);
    Some(from_srgb(target, srgb))
}

fn to_srgb(space: ColorSpace, c: [f64; 3]) -> [f64; 3] {
    match space {
        ColorSpace::Srgb => c,
        ColorSpace::Hsl => hsl_to_srgb(c),
        ColorSpace::Oklab => gamma_encode(oklab_to_linear_srgb(c)),
        ColorSpace::Oklch => gamma_encode(oklab_to_linear_srgb(oklch_to_oklab(c))),
        ColorSpace::DisplayP3 => {
            let xyz = mul(&P3_TO_XYZ, gamma_decode(c));
            gamma_encode(mul(&XYZ_TO_SRGB, xyz))
        }
    }
}

fn from_srgb(space: ColorSpace, c: [f64; 3]) -> [f64; 3] {
    match space {
        ColorSpace::Srgb => c,
        ColorSpace::Hsl => srgb_to_hsl(c),
        ColorSpace::Oklab => linear_srgb_to_oklab(gamma_decode(c)),
        ColorSpace::Oklch => oklab_to_oklch(linear_srgb_to_oklab(gamma_decode(c))),
        ColorSpace::DisplayP3 => {
            let xyz = mul(&SRGB_TO_XYZ, gamma_decode(c));
            gamma_encode(mul(&XYZ_TO_P3, xyz))
        }
    }
}

// sRGB and Display P3 share the same transfer function

fn decode_channel(v: f64) -> f64 {
    let abs = v.abs();
    let linear = if abs <= 0.04045 {
        abs / 12.92
    } else {
        ((abs + 0.055) / 1.055).powf(2.4)
    };
    linear.copysign(v)
}

fn encode_channel(v: f64) -> f64 {
    let abs = v.abs();
    let encoded = if abs <= 0.0031308 {
        abs * 12.92
    } else {
        1.055 * abs.powf(1.0 / 2.4) - 0.055
    };
    encoded.copysign(v)
}

fn gamma_decode(c: [f64; 3]) -> [f64; 3] {
    c.map(decode_channel)
}

fn gamma_encode(c: [f64; 3]) -> [f64; 3] {
    c.map(encode_channel)
}

fn mul(m: &[[f64; 3]; 3], v: [f64; 3]) -> [f64; 3] {
    [
        m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
        m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
        m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
    ]
}

const SRGB_TO_XYZ: [[f64; 3]; 3] = [
    [0.41239079926595934, 0.357584339383878, 0.1804807884018343],
    [0.21263900587151027, 0.715168678767756, 0.07219231536073371],
    [0.01933081871559182, 0.11919477979462598, 0.9505321522496606],
];

const XYZ_TO_SRGB: [[f64; 3]; 3] = [
    [3.2409699419045226, -1.537383177570094, -0.4986107602930034],
    [-0.9692436362808796, 1.8759675015077202, 0.04155505740717559],
    [0.05563007969699366, -0.20397695888897652, 1.0569715142428786],
];

const P3_TO_XYZ: [[f64; 3]; 3] = [
    [0.4865709486482162, 0.26566769316909306, 0.1982172852343625],
    [0.2289745640697488, 0.6917385218365064, 0.079286914093745],
    [0.0, 0.04511338185890264, 1.043944368900976],
];

const XYZ_TO_P3: [[f64; 3]; 3] = [
    [2.493496911941425, -0.9313836179191239, -0.40271078445071684],
    [-0.8294889695615747, 1.7626640603183463, 0.023624685841943577],
    [0.03584583024378447, -0.07617238926804182, 0.9568845240076872],
];

fn linear_srgb_to_oklab([r, g, b]: [f64; 3]) -> [f64; 3] {
    let l = 0.4122214708 * r + 0.5363325363 * g + 0.0514459929 * b;
    let m = 0.2119034982 * r + 0.6806995451 * g + 0.1073969566 * b;
    let s = 0.0883024619 * r + 0.2817188376 * g + 0.6299787005 * b;

    let (l, m, s) = (l.cbrt(), m.cbrt(), s.cbrt());

    [
        0.2104542553 * l + 0.7936177850 * m - 0.0040720468 * s,
        1.9779984951 * l - 2.4285922050 * m + 0.4505937099 * s,
        0.0259040371 * l + 0.7827717662 * m - 0.8086757660 * s,
    ]
}

fn oklab_to_linear_srgb([lightness, a, b]: [f64; 3]) -> [f64; 3] {
    let l = lightness + 0.3963377774 * a + 0.2158037573 * b;
    let m = lightness - 0.1055613458 * a - 0.0638541728 * b;
    let s = lightness - 0.0894841775 * a - 1.2914855480 * b;

    let (l, m, s) = (l * l * l, m * m * m, s * s * s);

    [
        4.0767416621 * l - 3.3077115913 * m + 0.2309699292 * s,
        -1.2684380046 * l + 2.6097574011 * m - 0.3413193965 * s,
        -0.0041960863 * l - 0.7034186147 * m + 1.7076147010 * s,
    ]
}

fn oklab_to_oklch([l, a, b]: [f64; 3]) -> [f64; 3] {
    let chroma = (a * a + b * b).sqrt();
    let hue = if chroma < 1e-9 {
        0.0
    } else {
        b.atan2(a).to_degrees().rem_euclid(360.0)
    };
    [l, chroma, hue]
}

fn oklch_to_oklab([l, c, h]: [f64; 3]) -> [f64; 3] {
    let radians = h.to_radians();
    [l, c * radians.cos(), c * radians.sin()]
}

fn srgb_to_hsl([r, g, b]: [f64; 3]) -> [f64; 3] {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let lightness = (max + min) / 2.0;
    let delta = max - min;

    if delta.abs() < 1e-12 {
        return [0.0, 0.0, lightness];
    }

    let saturation = if lightness <= 0.5 {
        delta / (max + min)
    } else {
        delta / (2.0 - max - min)
    };

    let hue = if max == r {
        ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        (b - r) / delta + 2.0
    } else {
        (r - g) / delta + 4.0
    };

    [(hue * 60.0).rem_euclid(360.0), saturation, lightness]
}

fn hsl_to_srgb([h, s, l]: [f64; 3]) -> [f64; 3] {
    let h = h.rem_euclid(360.0);
    let chroma = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let x = chroma * (1.0 - ((h / 60.0).rem_euclid(2.0) - 1.0).abs());
    let m = l - chroma / 2.0;

    let (r, g, b) = match (h / 60.0) as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };

    [r + m, g + m, b + m]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: [f64; 3], b: [f64; 3], tolerance: f64) {
        for i in 0..3 {
            assert!(
                (a[i] - b[i]).abs() < tolerance,
                "channel {} differs: {:?} vs {:?}",
                i,
                a,
                b
            );
        }
    }

    #[test]
    fn test_srgb_to_hsl_primaries() {
        let red = Color::srgb(1.0, 0.0, 0.0, 1.0);
        assert_close(red.convert(ColorSpace::Hsl).channels, [0.0, 1.0, 0.5], 1e-9);

        let green = Color::srgb(0.0, 1.0, 0.0, 1.0);
        assert_close(green.convert(ColorSpace::Hsl).channels, [120.0, 1.0, 0.5], 1e-9);

        let gray = Color::srgb(0.5, 0.5, 0.5, 1.0);
        assert_close(gray.convert(ColorSpace::Hsl).channels, [0.0, 0.0, 0.5], 1e-9);
    }

    #[test]
    fn test_white_in_oklab() {
        let white = Color::srgb(1.0, 1.0, 1.0, 1.0).convert(ColorSpace::Oklab);
        assert_close(white.channels, [1.0, 0.0, 0.0], 1e-3);
    }

    #[test]
    fn test_round_trip_through_every_space() {
        let original = Color::srgb(0.2, 0.4, 0.8, 0.5);
        for space in ColorSpace::ALL {
            let back = original.convert(space).convert(ColorSpace::Srgb);
            assert_close(back.channels, original.channels, 1e-4);
        }
    }

    #[test]
    fn test_alpha_preserved_for_every_pair() {
        let alphas = [0.0, 0.123456789, 0.5, 1.0];
        for from in ColorSpace::ALL {
            for to in ColorSpace::ALL {
                for alpha in alphas {
                    let color = Color::new(from, [0.3, 0.2, 0.1], alpha);
                    assert_eq!(color.convert(to).alpha, alpha, "{} -> {}", from, to);
                }
            }
        }
    }

    #[test]
    fn test_non_finite_input_returned_unchanged() {
        let broken = Color::new(ColorSpace::Oklch, [f64::NAN, 0.1, 10.0], 0.4);
        let converted = broken.convert(ColorSpace::Srgb);
        assert_eq!(converted.color_space, ColorSpace::Oklch);
        assert!(converted.channels[0].is_nan());
        assert_eq!(converted.alpha, 0.4);
    }

    #[test]
    fn test_display_p3_red_is_outside_srgb() {
        let p3_red = Color::new(ColorSpace::DisplayP3, [1.0, 0.0, 0.0], 1.0);
        let srgb = p3_red.convert(ColorSpace::Srgb);
        assert!(srgb.channels[0] > 1.0);
        assert!(srgb.channels[1] < 0.0);
    }
}
