use once_cell::sync::Lazy;
use regex::Regex;

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\W+").expect("static regex"));

/// ラベルから非単語文字を除去し小文字化する。
///
/// `"Refunds & Billing"` becomes `"refundsbilling"`.
#[must_use]
pub fn normalize_label(label: &str) -> String {
    NON_WORD.replace_all(label, "").to_lowercase()
}
