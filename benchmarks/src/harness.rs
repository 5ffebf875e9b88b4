use primbench::harness::Measurement;

/// Every variant measured for one primitive at one problem size.
pub struct BenchResult {
    pub primitive: &'static str,
    pub n: usize,
    pub measurements: Vec<Measurement>,
}

pub fn format_count(n: usize) -> String {
    if n >= 1 << 20 && n % (1 << 20) == 0 {
        format!("{}Mi", n >> 20)
    } else if n >= 1 << 10 && n % (1 << 10) == 0 {
        format!("{}Ki", n >> 10)
    } else {
        format!("{}", n)
    }
}

/// Print one table per result to stdout. Only verified measurements reach
/// this point, so every row is checked.
pub fn print_table(results: &[BenchResult]) {
    let name_w = 24;
    let col_w = 12;

    for r in results {
        println!();
        println!("{} (n = {})", r.primitive, format_count(r.n));
        println!(
            "{:<name_w$} {:>col_w$} {:>col_w$} {:>col_w$} {:>col_w$} {:>col_w$} {:>6}",
            "Variant", "Mean (s)", "±Stddev (s)", "Min (s)", "Max (s)", "M/s", "Check",
            name_w = name_w, col_w = col_w
        );
        println!("{}", "-".repeat(name_w + col_w * 5 + 6 + 6));

        for m in &r.measurements {
            let throughput = match m.throughput() {
                Some(t) => format!("{:.1}", t),
                None => "N/A".to_string(),
            };
            println!(
                "{:<name_w$} {:>col_w$.6} {:>col_w$.6} {:>col_w$.6} {:>col_w$.6} {:>col_w$} {:>6}",
                m.name, m.stats.mean, m.stats.stddev, m.stats.min, m.stats.max, throughput, "✓",
                name_w = name_w, col_w = col_w
            );
        }
    }
    println!();
}
