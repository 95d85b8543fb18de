//! Balance classification and report rendering.
//!
//! Pure functions, no I/O. Identical input always renders identical text,
//! so reports can be compared byte for byte in tests.

use serde::{Deserialize, Serialize};

use crate::types::Balances;

/// At or below this a balance is low and escalation channels fire.
pub const LOW_THRESHOLD: f64 = 10.0;
/// Above this a balance is sufficient.
pub const SUFFICIENT_THRESHOLD: f64 = 100.0;

/// Closing line when either balance is low.
pub const LOW_CLOSING: &str = "⚠️ Balance insufficient, recharge soon";
/// Closing line when both balances are fine.
pub const OK_CLOSING: &str = "Balance sufficient, continue monitoring";

/// Classification of a single balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Adequate,
    Sufficient,
}

impl Severity {
    /// Label shown next to the balance in reports.
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Low => "⚠️ Low",
            Severity::Adequate => "Adequate",
            Severity::Sufficient => "Sufficient",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// How report text is escaped for the target channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscapeMode {
    Plain,
    /// Backslash-escape every Telegram MarkdownV2 reserved character.
    MarkdownV2,
}

/// Characters Telegram rejects unescaped in MarkdownV2 text.
pub const MARKDOWN_V2_RESERVED: &[char] = &[
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!', '\\',
];

/// Escape `text` for MarkdownV2 outside of any entity.
pub fn escape_markdown_v2(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        if MARKDOWN_V2_RESERVED.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// `Low <= 10 < Adequate <= 100 < Sufficient`.
pub fn classify(balance: f64) -> Severity {
    if balance > SUFFICIENT_THRESHOLD {
        Severity::Sufficient
    } else if balance > LOW_THRESHOLD {
        Severity::Adequate
    } else {
        Severity::Low
    }
}

/// Two report lines, one per metered quantity, then a blank line.
pub fn format_report(balances: &Balances, escape: EscapeMode) -> String {
    let text = format!(
        "💡 Lighting balance: {} kWh, {}\n❄️ Air-conditioning balance: {} kWh, {}\n\n",
        balances.lt,
        balances.lt_severity().label(),
        balances.ac,
        balances.ac_severity().label(),
    );
    match escape {
        EscapeMode::Plain => text,
        EscapeMode::MarkdownV2 => escape_markdown_v2(&text),
    }
}

/// Closing line chosen by the combined severity.
pub fn closing_line(balances: &Balances) -> &'static str {
    if balances.is_low() { LOW_CLOSING } else { OK_CLOSING }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_boundaries() {
        assert_eq!(classify(-1.0), Severity::Low);
        assert_eq!(classify(10.0), Severity::Low);
        assert_eq!(classify(10.01), Severity::Adequate);
        assert_eq!(classify(100.0), Severity::Adequate);
        assert_eq!(classify(100.5), Severity::Sufficient);
    }

    #[test]
    fn test_markdown_report_escapes_labels_and_values() {
        let report = format_report(&Balances::new(12.5, -1.5), EscapeMode::MarkdownV2);
        assert!(report.contains("12\\.5"));
        assert!(report.contains("Air\\-conditioning"));
        assert!(report.contains("\\-1\\.5 kWh"));
    }

    #[test]
    fn test_escape_markdown_v2() {
        assert_eq!(escape_markdown_v2("a-b.c!"), "a\\-b\\.c\\!");
        assert_eq!(escape_markdown_v2("(x_y)"), "\\(x\\_y\\)");
        assert_eq!(escape_markdown_v2("\\"), "\\\\");
        assert_eq!(escape_markdown_v2("⚠️ Low, 5 kWh"), "⚠️ Low, 5 kWh");
    }

    #[test]
    fn test_plain_report_lines() {
        let report = format_report(&Balances::new(12.5, 5.0), EscapeMode::Plain);
        assert_eq!(
            report,
            "💡 Lighting balance: 12.5 kWh, Adequate\n❄️ Air-conditioning balance: 5 kWh, ⚠️ Low\n\n"
        );
    }

    #[test]
    fn test_report_is_deterministic() {
        let b = Balances::new(99.9, 101.0);
        assert_eq!(
            format_report(&b, EscapeMode::MarkdownV2),
            format_report(&b, EscapeMode::MarkdownV2)
        );
    }

    #[test]
    fn test_closing_line() {
        assert_eq!(closing_line(&Balances::new(50.0, 9.0)), LOW_CLOSING);
        assert_eq!(closing_line(&Balances::new(50.0, 90.0)), OK_CLOSING);
    }
}
