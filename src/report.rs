//! Plain-text rendering of fetch outcomes for the terminal.

use citycast_core::Units;
use citycast_weather::{GeoLocation, WeatherSnapshot};

/// One line per candidate, the one used for the weather call first.
pub fn format_candidates(candidates: &[GeoLocation]) -> String {
    let mut output = String::new();
    for (i, candidate) in candidates.iter().enumerate() {
        output.push_str(&format!(
            "{} {} ({:.4}, {:.4})\n",
            if i == 0 { "*" } else { " " },
            candidate.display_name(),
            candidate.latitude,
            candidate.longitude
        ));
    }
    output
}

/// Current conditions as a short multi-line report.
pub fn format_weather(snapshot: &WeatherSnapshot, units: Units, icon_base_url: &str) -> String {
    let temp = units.temperature_suffix();
    let mut output = format!(
        "Weather for {}{}\n",
        snapshot.city_name,
        if snapshot.country_code.is_empty() {
            String::new()
        } else {
            format!(", {}", snapshot.country_code)
        }
    );

    output.push_str(&format!(
        "  Conditions: {}\n  Temperature: {:.1}{} (feels like {:.1}{})\n  Range: {:.1}{} - {:.1}{}\n",
        capitalize(&snapshot.condition_description),
        snapshot.temperature,
        temp,
        snapshot.feels_like,
        temp,
        snapshot.temp_min,
        temp,
        snapshot.temp_max,
        temp
    ));
    output.push_str(&format!(
        "  Humidity: {}%\n  Pressure: {} hPa\n  Wind: {:.1} {} {}\n  Clouds: {}%\n  Visibility: {:.1} km\n",
        snapshot.humidity,
        snapshot.pressure,
        snapshot.wind_speed,
        wind_speed_unit(units),
        compass_point(snapshot.wind_direction),
        snapshot.cloud_cover_percent,
        f64::from(snapshot.visibility_meters) / 1000.0
    ));

    if let (Some(sunrise), Some(sunset)) = (snapshot.sunrise(), snapshot.sunset()) {
        output.push_str(&format!(
            "  Sunrise: {} UTC\n  Sunset: {} UTC\n",
            sunrise.format("%H:%M"),
            sunset.format("%H:%M")
        ));
    }
    if let Some(captured) = snapshot.captured_at() {
        output.push_str(&format!(
            "  Observed: {}\n",
            captured.format("%Y-%m-%d %H:%M UTC")
        ));
    }
    output.push_str(&format!("  Icon: {}\n", snapshot.icon_url(icon_base_url)));
    output
}

fn wind_speed_unit(units: Units) -> &'static str {
    match units {
        Units::Imperial => "mph",
        Units::Metric | Units::Standard => "m/s",
    }
}

/// 16-point compass name for a meteorological bearing.
fn compass_point(degrees: u16) -> &'static str {
    const POINTS: [&str; 16] = [
        "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW",
        "NW", "NNW",
    ];
    let index = ((f64::from(degrees % 360) / 22.5).round() as usize) % POINTS.len();
    POINTS[index]
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
