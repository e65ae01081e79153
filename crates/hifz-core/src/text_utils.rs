//! Text helpers for word display and time labels.

use unicode_normalization::UnicodeNormalization;

/// Split a verse into display words on whitespace after NFC normalisation.
pub fn split_words(text: &str) -> Vec<String> {
    let normalized: String = text.nfc().collect();
    normalized
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Format seconds as `m:ss`; negative or non-finite input renders as `0:00`.
pub fn format_clock(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "0:00".to_string();
    }
    let whole = seconds.floor() as u64;
    format!("{}:{:02}", whole / 60, whole % 60)
}

/// Like [`format_clock`], but an unknown (zero) duration renders as a dash.
pub fn format_duration(seconds: Option<f64>) -> String {
    match seconds {
        Some(secs) if secs > 0.0 => format_clock(secs),
        _ => "—".to_string(),
    }
}
