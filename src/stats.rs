//! Document counts per locale.
//!
//! Uses the same row constraints as the main document query, so the numbers
//! match what `wikimig run` would stream. Used by `wikimig count` to size a
//! run before starting it.

use anyhow::Result;

use crate::source::{DocumentSource, LocaleCount};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountSummary {
    pub locales: Vec<LocaleCount>,
    pub total: i64,
}

pub async fn count_documents(source: &dyn DocumentSource) -> Result<CountSummary> {
    let result = source.document_counts().await;
    source.close().await;
    let locales = result?;
    let total = locales.iter().map(|c| c.count).sum();
    Ok(CountSummary { locales, total })
}

/// Print the counts as a table on stdout.
pub fn print_counts(summary: &CountSummary) {
    println!("Document counts");
    println!("===============");
    println!();
    println!("  {:<10} {:>10}", "LOCALE", "DOCS");
    println!("  {}", "-".repeat(21));
    for c in &summary.locales {
        println!("  {:<10} {:>10}", c.locale, format_number(c.count));
    }
    println!("  {}", "-".repeat(21));
    println!("  {:<10} {:>10}", "total", format_number(summary.total));
    println!();
}

/// Format an integer with thousands separators (e.g. "1,234,567").
fn format_number(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
