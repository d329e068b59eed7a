use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use gdp_compare::analytics::{self, AlignedRow};
use gdp_compare::api::partition_loads;
use gdp_compare::config::Settings;
use gdp_compare::{Client, Country, CountrySeries, YearRange, stats, storage};
use log::{info, warn};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "gdpc",
    version,
    about = "Fetch, compare & export GDP per capita from the World Bank"
)]
struct Cli {
    /// API base URL (overrides GDPC_API_BASE).
    #[arg(long, global = true)]
    base_url: Option<String>,
    /// Indicator id (overrides GDPC_INDICATOR; default NY.GDP.PCAP.CD).
    #[arg(long, global = true)]
    indicator: Option<String>,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List sovereign countries (aggregates are left out).
    Countries(CountriesArgs),
    /// Fetch series, print the aligned table (and optionally compare, summarize, export).
    Show(ShowArgs),
}

#[derive(ValueEnum, Clone, Debug)]
enum OutFormat {
    Csv,
    Json,
}

#[derive(Args, Debug)]
struct CountriesArgs {
    /// Only countries whose region contains this text (case-insensitive).
    #[arg(long)]
    region: Option<String>,
}

#[derive(Args, Debug)]
struct ShowArgs {
    /// Country codes separated by comma or semicolon (e.g., DEU,JPN)
    #[arg(short, long)]
    countries: String,
    /// First year (inclusive).
    #[arg(long, default_value_t = 2000)]
    from: i32,
    /// Last year (inclusive).
    #[arg(long, default_value_t = 2020)]
    to: i32,
    /// Print comparison metrics (requires exactly two countries).
    #[arg(long, default_value_t = false)]
    compare: bool,
    /// Print summary statistics per country.
    #[arg(long, default_value_t = false)]
    stats: bool,
    /// JSON file mapping country code to leaders, shown next to each year.
    #[arg(long)]
    leaders: Option<PathBuf>,
    /// Export each series to this path (one file per country when several are selected).
    #[arg(long)]
    out: Option<PathBuf>,
    /// Output format (csv or json). If omitted, inferred from --out extension.
    #[arg(long, value_enum)]
    format: Option<OutFormat>,
}

fn fmt_opt(v: Option<f64>) -> String {
    match v {
        Some(x) if x.is_finite() => {
            // Format up to 4 decimals, then trim trailing zeros and trailing dot.
            let s = format!("{:.4}", x);
            s.trim_end_matches('0').trim_end_matches('.').to_string()
        }
        _ => "NA".to_string(),
    }
}

fn parse_list(s: &str) -> Vec<String> {
    s.split([',', ';'])
        .map(|x| x.trim().to_ascii_uppercase())
        .filter(|x| !x.is_empty())
        .collect()
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let mut settings = Settings::from_env()?;
    if let Some(url) = cli.base_url {
        settings.base_url = url.trim_end_matches('/').to_string();
    }
    if let Some(ind) = cli.indicator {
        settings.indicator = ind;
    }
    settings.validate()?;
    let mut client = Client::new(&settings)?;

    match cli.cmd {
        Command::Countries(args) => cmd_countries(&mut client, args),
        Command::Show(args) => cmd_show(&mut client, args),
    }
}

fn cmd_countries(client: &mut Client, args: CountriesArgs) -> Result<()> {
    let needle = args.region.map(|r| r.to_lowercase());
    let mut countries = client.fetch_countries().context("failed to load countries")?;
    countries.sort_by(|a, b| a.name.cmp(&b.name));
    for c in countries
        .iter()
        .filter(|c| needle.as_ref().is_none_or(|n| c.region.to_lowercase().contains(n)))
    {
        println!("{}\t{}\t{}", c.code, c.name, c.region);
    }
    Ok(())
}

/// Resolve requested codes against the country list; unknown codes still get fetched.
fn resolve_selection(client: &mut Client, codes: &[String]) -> Vec<Country> {
    let known = match client.fetch_countries() {
        Ok(list) => list,
        Err(e) => {
            warn!("country list unavailable, using codes as names: {e}");
            Vec::new()
        }
    };
    codes
        .iter()
        .map(|code| {
            known
                .iter()
                .find(|c| c.code.eq_ignore_ascii_case(code))
                .cloned()
                .unwrap_or_else(|| Country {
                    code: code.clone(),
                    name: code.clone(),
                    region: String::new(),
                })
        })
        .collect()
}

fn cmd_show(client: &mut Client, args: ShowArgs) -> Result<()> {
    let codes = parse_list(&args.countries);
    if codes.is_empty() {
        anyhow::bail!("at least one country code required");
    }
    if args.from > args.to {
        anyhow::bail!("--from {} is after --to {}", args.from, args.to);
    }
    let range = YearRange::new(args.from, args.to);

    let selection = resolve_selection(client, &codes);
    let (mut series, failed) = partition_loads(client.load_series(&selection, range.start, range.end));
    for (country, err) in &failed {
        eprintln!("Failed to load {} ({}): {}", country.name, country.code, err);
    }
    if series.is_empty() {
        anyhow::bail!("no country could be loaded");
    }

    if let Some(path) = args.leaders.as_ref() {
        let mut leaders = storage::load_leaders(path)?;
        for s in series.iter_mut() {
            if let Some(l) = leaders.remove(&s.id) {
                s.leaders = l;
            }
        }
    }

    let rows = analytics::align(&series, range);
    print_table(&series, &rows, args.leaders.is_some());

    if args.compare {
        let [a, b] = series.as_slice() else {
            anyhow::bail!("--compare needs exactly two loaded countries, got {}", series.len());
        };
        let m = analytics::compare(a, b, &rows);
        println!();
        println!("{} vs {}", a.name, b.name);
        println!("  starting ratio      {}", fmt_opt(Some(m.starting_ratio)));
        println!("  ending ratio        {}", fmt_opt(Some(m.ending_ratio)));
        println!("  avg growth diff (%) {}", fmt_opt(Some(m.average_growth_diff)));
        if m.overtakes.is_empty() {
            println!("  no overtakes");
        }
        for o in &m.overtakes {
            println!("  {}: {} takes the lead", o.year, o.country);
        }
    }

    if args.stats {
        println!();
        for s in stats::summarize(&series, range) {
            println!(
                "{} • {}  count={}  min={} max={} mean={} median={} cagr%={}",
                s.country_id,
                s.country_name,
                s.count,
                fmt_opt(s.min),
                fmt_opt(s.max),
                fmt_opt(s.mean),
                fmt_opt(s.median),
                fmt_opt(s.cagr)
            );
        }
    }

    if let Some(path) = args.out.as_ref() {
        let fmt = match args.format {
            Some(OutFormat::Csv) => "csv",
            Some(OutFormat::Json) => "json",
            None => path.extension().and_then(|e| e.to_str()).unwrap_or("csv"),
        }
        .to_ascii_lowercase();
        for s in &series {
            let target = export_path(path, &s.id, series.len() > 1, &fmt);
            match fmt.as_str() {
                "csv" => storage::save_csv(s, range, &target)?,
                "json" => storage::save_json(s, range, &target)?,
                other => anyhow::bail!("unsupported format: {}", other),
            }
            info!("exported {} to {}", s.id, target.display());
            eprintln!("Saved {} to {}", s.name, target.display());
        }
    }

    Ok(())
}

/// Target file for one exported series; always carries the extension of the written format.
fn export_path(base: &Path, code: &str, per_country: bool, ext: &str) -> PathBuf {
    if !per_country {
        return base.with_extension(ext);
    }
    let stem = base
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("gdp");
    base.with_file_name(format!("{stem}_{code}.{ext}"))
}

fn print_table(series: &[CountrySeries], rows: &[AlignedRow], with_leaders: bool) {
    let mut header = vec!["Year".to_string()];
    for s in series {
        header.push(format!("{} GDP/cap", s.id));
        header.push(format!("{} growth%", s.id));
        if with_leaders {
            header.push(format!("{} leader", s.id));
        }
    }
    println!("{}", header.join("\t"));

    for row in rows {
        let mut cells = vec![row.year.to_string()];
        for s in series {
            cells.push(fmt_opt(row.value(&s.id)));
            cells.push(fmt_opt(row.growth(&s.id).map(|g| (g * 100.0).round() / 100.0)));
            if with_leaders {
                cells.push(
                    analytics::leader_in_office(s, row.year)
                        .map(|l| l.name.clone())
                        .unwrap_or_else(|| "-".into()),
                );
            }
        }
        println!("{}", cells.join("\t"));
    }
}
