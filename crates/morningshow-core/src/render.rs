//! Text and speech templates for the morning digest.

use chrono::{Datelike, NaiveDate};
use tracing::debug;

use crate::domain::{Asset, Digest, DigestInput};
use crate::format::{
    checked_fixed, rain_label, truncate_chars, wind_kmh, FieldRange, MAX_DIGEST_CHARS, PLACEHOLDER,
};

/// Spoken in place of the placeholder glyph.
pub const SPOKEN_PLACEHOLDER: &str = "нет данных";

const PROMPT: &str = "Сказать ещё раз или завершить?";

const WEEKDAYS_RU: [&str; 7] = [
    "Понедельник",
    "Вторник",
    "Среда",
    "Четверг",
    "Пятница",
    "Суббота",
    "Воскресенье",
];

pub fn weekday_ru(date: NaiveDate) -> &'static str {
    WEEKDAYS_RU[date.weekday().num_days_from_monday() as usize]
}

/// Display strings for each field; `None` means the placeholder.
#[derive(Debug, Default)]
struct Fields {
    air: Option<String>,
    water: Option<String>,
    wind: Option<String>,
    humidity: Option<String>,
    precip_mm: Option<f64>,
    btc: Option<String>,
    gold: Option<String>,
    xrp: Option<String>,
}

impl Fields {
    fn from_input(input: &DigestInput) -> Self {
        let weather = &input.weather;
        Self {
            air: number(weather.air_temp_c, 1, FieldRange::AIR_TEMP_C),
            water: number(input.sea_temp_c, 1, FieldRange::SEA_TEMP_C),
            wind: number(wind_kmh(weather.wind_mps), 0, FieldRange::WIND_KMH),
            humidity: number(weather.humidity_pct, 0, FieldRange::HUMIDITY_PCT),
            precip_mm: weather.precip_mm,
            btc: number(input.price(Asset::Btc), 0, FieldRange::PRICE_USD),
            gold: number(input.price(Asset::Xau), 2, FieldRange::PRICE_USD),
            xrp: number(input.price(Asset::Xrp), 3, FieldRange::PRICE_USD),
        }
    }
}

fn number(value: Option<f64>, decimals: usize, range: FieldRange) -> Option<String> {
    value?;
    match checked_fixed(value, decimals, range) {
        Ok(formatted) => Some(formatted),
        Err(error) => {
            debug!(error = %error, "value not displayable; using placeholder");
            None
        }
    }
}

fn with_unit(value: &Option<String>, render: impl Fn(&str) -> String, missing: &str) -> String {
    value.as_deref().map(render).unwrap_or_else(|| missing.to_owned())
}

/// Renders both digest variants for the local `date`.
///
/// `location` labels the weather line. Each text is truncated independently to
/// [`MAX_DIGEST_CHARS`] characters.
pub fn render_digest(input: &DigestInput, date: NaiveDate, location: &str) -> Digest {
    let fields = Fields::from_input(input);
    Digest {
        text: truncate_chars(&render_text(&fields, input, date, location), MAX_DIGEST_CHARS),
        speech_text: truncate_chars(
            &render_speech(&fields, input, date, location),
            MAX_DIGEST_CHARS,
        ),
    }
}

fn render_text(fields: &Fields, input: &DigestInput, date: NaiveDate, location: &str) -> String {
    let celsius = |v: &str| format!("{v}°C");
    let dollars = |v: &str| format!("${v}");
    let rain = rain_label(fields.precip_mm, PLACEHOLDER);

    format!(
        "{weekday}, {date}\n\
         {location} — Погода: воздух {air}, вода {water}, ветер {wind}, дождь: {rain}, влажность {humidity}.\n\
         Цены: BTC {btc}, Золото {gold} за унцию, XRP {xrp}.\n\
         Цитата дня: {quote}\n\
         {PROMPT}",
        weekday = weekday_ru(date),
        date = date.format("%d.%m.%Y"),
        air = with_unit(&fields.air, celsius, PLACEHOLDER),
        water = with_unit(&fields.water, celsius, PLACEHOLDER),
        wind = with_unit(&fields.wind, |v| format!("{v} км/ч"), PLACEHOLDER),
        humidity = with_unit(&fields.humidity, |v| format!("{v}%"), PLACEHOLDER),
        btc = with_unit(&fields.btc, dollars, PLACEHOLDER),
        gold = with_unit(&fields.gold, dollars, PLACEHOLDER),
        xrp = with_unit(&fields.xrp, dollars, PLACEHOLDER),
        quote = input.quote.as_deref().unwrap_or(PLACEHOLDER),
    )
}

fn render_speech(fields: &Fields, input: &DigestInput, date: NaiveDate, location: &str) -> String {
    let degrees = |v: &str| format!("{v} градусов");
    let dollars = |v: &str| format!("{v} долларов");
    let rain = rain_label(fields.precip_mm, SPOKEN_PLACEHOLDER);

    format!(
        "{weekday}.\n\
         {location}. Погода: воздух {air}, вода {water}, ветер {wind}, дождь: {rain}, влажность {humidity}.\n\
         Цены: биткоин {btc}, золото {gold} за унцию, XRP {xrp}.\n\
         Цитата дня: {quote}\n\
         {PROMPT}",
        weekday = weekday_ru(date),
        air = with_unit(&fields.air, degrees, SPOKEN_PLACEHOLDER),
        water = with_unit(&fields.water, degrees, SPOKEN_PLACEHOLDER),
        wind = with_unit(&fields.wind, |v| format!("{v} км в час"), SPOKEN_PLACEHOLDER),
        humidity = with_unit(&fields.humidity, |v| format!("{v} процентов"), SPOKEN_PLACEHOLDER),
        btc = with_unit(&fields.btc, dollars, SPOKEN_PLACEHOLDER),
        gold = with_unit(&fields.gold, dollars, SPOKEN_PLACEHOLDER),
        xrp = with_unit(&fields.xrp, dollars, SPOKEN_PLACEHOLDER),
        quote = input.quote.as_deref().unwrap_or(SPOKEN_PLACEHOLDER),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PriceQuote, WeatherSample};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).expect("valid date")
    }

    fn full_input() -> DigestInput {
        DigestInput {
            weather: WeatherSample {
                air_temp_c: Some(31.26),
                humidity_pct: Some(48.0),
                precip_mm: Some(0.0),
                wind_mps: Some(10.0),
            },
            sea_temp_c: Some(29.4),
            prices: vec![
                PriceQuote::new(Asset::Btc, Some(64_123.6)),
                PriceQuote::new(Asset::Xrp, Some(0.52349)),
                PriceQuote::new(Asset::Xau, Some(2331.456)),
            ],
            quote: Some("Скорость без вектора — просто суета.".to_owned()),
        }
    }

    #[test]
    fn text_follows_line_templates() {
        let digest = render_digest(&full_input(), date(), "Катар");

        assert_eq!(
            digest.text,
            "Понедельник, 03.06.2024\n\
             Катар — Погода: воздух 31.3°C, вода 29.4°C, ветер 36 км/ч, дождь: нет, влажность 48%.\n\
             Цены: BTC $64124, Золото $2331.46 за унцию, XRP $0.523.\n\
             Цитата дня: Скорость без вектора — просто суета.\n\
             Сказать ещё раз или завершить?"
        );
    }

    #[test]
    fn speech_spells_out_units() {
        let digest = render_digest(&full_input(), date(), "Катар");

        assert!(digest.speech_text.starts_with("Понедельник.\n"));
        assert!(!digest.speech_text.contains("03.06.2024"));
        assert!(digest.speech_text.contains("воздух 31.3 градусов"));
        assert!(digest.speech_text.contains("ветер 36 км в час"));
        assert!(digest.speech_text.contains("влажность 48 процентов"));
        assert!(digest.speech_text.contains("биткоин 64124 долларов"));
    }

    #[test]
    fn missing_values_render_bare_placeholder() {
        let digest = render_digest(&DigestInput::default(), date(), "Катар");

        assert!(digest.text.contains(
            "воздух —, вода —, ветер —, дождь: —, влажность —."
        ));
        assert!(digest.text.contains("BTC —, Золото — за унцию, XRP —."));
        assert!(digest.text.contains("Цитата дня: —"));
        assert!(!digest.text.contains("°C"));
        assert!(!digest.text.contains('$'));
        assert!(digest.speech_text.contains("воздух нет данных"));
    }

    #[test]
    fn out_of_range_value_becomes_placeholder() {
        let input = DigestInput {
            weather: WeatherSample {
                humidity_pct: Some(180.0),
                air_temp_c: Some(25.0),
                ..WeatherSample::default()
            },
            ..DigestInput::default()
        };
        let digest = render_digest(&input, date(), "Катар");

        assert!(digest.text.contains("воздух 25.0°C"));
        assert!(digest.text.contains("влажность —."));
    }

    #[test]
    fn weekday_names_start_on_monday() {
        assert_eq!(weekday_ru(date()), "Понедельник");
        assert_eq!(
            weekday_ru(NaiveDate::from_ymd_opt(2024, 6, 9).expect("valid date")),
            "Воскресенье"
        );
    }

    #[test]
    fn long_quote_truncates_both_variants_to_limit() {
        let input = DigestInput {
            quote: Some("ж".repeat(2000)),
            ..DigestInput::default()
        };
        let digest = render_digest(&input, date(), "Катар");

        assert_eq!(digest.text.chars().count(), MAX_DIGEST_CHARS);
        assert_eq!(digest.speech_text.chars().count(), MAX_DIGEST_CHARS);
    }
}
