use std::path::Path;

/// Print the startup banner with the listen address and database summary.
pub fn print_banner(host: &str, port: u16, db_path: &Path, pending_migrations: usize) {
    let version = env!("CARGO_PKG_VERSION");

    let url = format!("http://{host}:{port}");
    let tilde = |p: &Path| match std::env::var("HOME") {
        Ok(home) if !home.is_empty() => p.to_string_lossy().replace(&home, "~"),
        _ => p.to_string_lossy().to_string(),
    };
    let database = tilde(db_path);
    let schema = if pending_migrations == 0 {
        "up to date".to_string()
    } else {
        format!("{pending_migrations} pending, run `madrasa migrate`")
    };

    // Layout
    let width = 70;
    let left_w = 24;
    let right_w = width - left_w - 3; // 3 for "│ " + "│"

    let title = format!("Madrasa v{version}");
    let title_dashes = width - 2 - title.len() - 5; // 2 for ╭╮, 5 for "─── " + " "
    let top = format!("╭─── {title} {}╮", "─".repeat(title_dashes));
    let bottom = format!("╰{}╯", "─".repeat(width - 2));

    let row = |l: &str, r: &str| format!("│ {:<left_w$}│  {:<right_w$}│", l, r);
    let clip = |s: String| {
        if s.chars().count() > right_w - 12 {
            let tail: String = s.chars().rev().take(right_w - 15).collect();
            format!("...{}", tail.chars().rev().collect::<String>())
        } else {
            s
        }
    };

    println!("{top}");
    println!("{}", row("", ""));
    println!("{}", row("  Madrasa API", "Gateway"));
    println!("{}", row("  Masala & teachers", &url));
    println!("{}", row("", &"─".repeat(right_w - 2)));
    println!(
        "{}",
        row("", &format!("Database    {}", clip(database)))
    );
    println!("{}", row("", &format!("Schema      {schema}")));
    println!("{}", row("", "Press Ctrl+C to stop"));
    println!("{}", row("", ""));
    println!("{bottom}");
}
