//! Round-trip behaviour of parse/serialize

use loupe_style::{
    parse, serialize, serialize_with, Color, ColorFormat, ColorSpace, LengthUnit,
    SerializeOptions, StyleValue,
};

fn assert_color_close(a: &StyleValue, b: &StyleValue) {
    match (a, b) {
        (StyleValue::Color(a), StyleValue::Color(b)) => {
            assert_eq!(a.color_space, b.color_space);
            for i in 0..3 {
                assert!(
                    (a.channels[i] - b.channels[i]).abs() < 1e-2,
                    "channel {} differs: {:?} vs {:?}",
                    i,
                    a,
                    b
                );
            }
            assert!((a.alpha - b.alpha).abs() < 1e-2);
        }
        _ => panic!("Expected two colors, got {:?} and {:?}", a, b),
    }
}

#[test]
fn test_padding_scenario() {
    let value = parse("padding", "16px");
    assert_eq!(value, StyleValue::unit(16.0, LengthUnit::Px));
    assert_eq!(serialize(&value), "16px");
}

#[test]
fn test_hex_scenario() {
    let value = parse("color", "#ff0000");
    assert_eq!(value, StyleValue::Color(Color::srgb(1.0, 0.0, 0.0, 1.0)));

    let hex = serialize_with(&value, &SerializeOptions::default().with_color_format(ColorFormat::Hex));
    assert!(hex.starts_with('#'));
}

#[test]
fn test_var_scenario() {
    let raw = "var(--spacing, 16px)";
    let value = parse("padding", raw);
    assert_eq!(
        value,
        StyleValue::var("--spacing", Some(StyleValue::unit(16.0, LengthUnit::Px)))
    );
    assert_eq!(serialize(&value), raw);
}

#[test]
fn test_exact_round_trip_for_non_color_values() {
    let values = vec![
        StyleValue::unit(-12.5, LengthUnit::Rem),
        StyleValue::unit(100.0, LengthUnit::Percent),
        StyleValue::unit(0.25, LengthUnit::Vmax),
        StyleValue::number(1.5),
        StyleValue::number(0.0),
        StyleValue::keyword("inline-flex"),
        StyleValue::var("--gap", None),
        StyleValue::var("--gap", Some(StyleValue::var("--fallback-gap", Some(StyleValue::unit(4.0, LengthUnit::Px))))),
        StyleValue::tuple(vec![
            StyleValue::unit(8.0, LengthUnit::Px),
            StyleValue::unit(16.0, LengthUnit::Px),
        ]),
        StyleValue::tuple(vec![
            StyleValue::keyword("solid"),
            StyleValue::var("--border-width", None),
            StyleValue::number(2.0),
        ]),
    ];

    for value in values {
        let text = serialize(&value);
        assert_eq!(parse("margin", &text), value, "round trip through {:?}", text);
    }
}

#[test]
fn test_color_round_trip_within_tolerance() {
    let colors = vec![
        Color::srgb(0.2, 0.4, 0.6, 1.0),
        Color::srgb(0.9, 0.1, 0.3, 0.35),
        Color::new(ColorSpace::Hsl, [210.0, 0.65, 0.45], 1.0),
        Color::new(ColorSpace::Hsl, [33.3, 0.1, 0.9], 0.7),
        Color::new(ColorSpace::Oklch, [0.628, 0.2577, 29.23], 1.0),
        Color::new(ColorSpace::Oklab, [0.5, -0.1, 0.12], 0.2),
        Color::new(ColorSpace::DisplayP3, [0.9, 0.2, 0.1], 1.0),
    ];

    for color in colors {
        let value = StyleValue::Color(color);
        let text = serialize(&value);
        assert_color_close(&parse("color", &text), &value);
    }
}

#[test]
fn test_color_round_trip_through_forced_formats() {
    let value = StyleValue::Color(Color::srgb(0.25, 0.5, 0.75, 1.0));
    for format in [
        ColorFormat::Hex,
        ColorFormat::Rgb,
        ColorFormat::Hsl,
        ColorFormat::Oklch,
        ColorFormat::Oklab,
        ColorFormat::DisplayP3,
    ] {
        let text = serialize_with(&value, &SerializeOptions::default().with_color_format(format));
        let parsed = parse("color", &text);
        assert!(parsed.approx_eq(&value), "{:?} via {}", format, text);
    }
}

#[test]
fn test_out_of_gamut_srgb_keeps_its_channels() {
    let value = parse("color", "rgb(300 0 0)");
    let text = serialize(&value);
    assert!(!text.starts_with('#'), "{}", text);
    assert_color_close(&parse("color", &text), &value);

    // Forcing hex cannot clip either
    let forced = serialize_with(&value, &SerializeOptions::default().with_color_format(ColorFormat::Hex));
    assert_color_close(&parse("color", &forced), &value);
}

#[test]
fn test_unparsed_passes_through() {
    let raw = "0 1px 2px rgba(0, 0, 0, 0.2), inset 0 0 0 1px #fff";
    let value = parse("box-shadow", raw);
    assert!(value.is_unparsed());
    assert_eq!(serialize(&value), raw);
}

#[test]
fn test_wire_json_round_trip() {
    let value = parse("border", "1px solid oklch(0.7 0.1 240 / 0.5)");
    let json = serde_json::to_string(&value).unwrap();
    let back: StyleValue = serde_json::from_str(&json).unwrap();
    assert_eq!(back, value);
}
