//! Benchmark result reporting.
//!
//! Prints each case as it completes, then optionally a CSV table with one
//! row per buffer size and a software/mirrored column pair per case.

use crate::throughput::Measurement;

/// Software and mirrored measurements for one case at one size.
pub struct CaseResult {
    pub name: &'static str,
    pub soft: Measurement,
    pub mirror: Measurement,
}

impl CaseResult {
    /// Prints best time and throughput for both engines.
    pub fn print(&self, size: usize) {
        println!("\n{}, buffer size: {}", self.name, size);
        println!("  Software ring best run:");
        print_measurement(&self.soft);
        println!("  Mirrored ring best run:");
        print_measurement(&self.mirror);
    }
}

/// Every case measured at one buffer size.
pub struct SizeReport {
    pub size: usize,
    pub cases: Vec<CaseResult>,
}

fn print_measurement(m: &Measurement) {
    println!("    Time (s): {:.9}", m.seconds);
    println!(
        "    Throughput: {:.3} GiB/s  ({:.0} B/s)",
        m.gib_per_sec(),
        m.bytes_per_sec()
    );
}

/// Prints the CSV table; `label` heads the size column.
pub fn print_csv(label: &str, reports: &[SizeReport]) {
    print!("{}", csv_table(label, reports));
}

fn csv_table(label: &str, reports: &[SizeReport]) -> String {
    let mut out = String::from(label);
    if let Some(first) = reports.first() {
        for case in &first.cases {
            out.push_str(&format!(",soft_{0},mirror_{0}", case.name));
        }
    }
    out.push('\n');

    for report in reports {
        out.push_str(&report.size.to_string());
        for case in &report.cases {
            out.push_str(&format!(
                ",{:.6},{:.6}",
                case.soft.gib_per_sec(),
                case.mirror.gib_per_sec()
            ));
        }
        out.push('\n');
    }
    out
}
