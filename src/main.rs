use anyhow::{anyhow, Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::fs;
use std::path::{Path, PathBuf};
use super40::merge;
use super40::reader::TableReader;
use super40::{catalog, logging, report, Config, Super40Analyzer, Table};

fn cli() -> Command {
    Command::new("super40")
        .version("0.1.0")
        .about("Merges student, exam and contact exports and selects a Super 40 across classes")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("super40.toml")
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Log per-row diagnostics")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            Command::new("merge")
                .about("Left-joins a second roster onto the first by student name")
                .arg(Arg::new("primary").required(true).value_name("PRIMARY"))
                .arg(Arg::new("secondary").required(true).value_name("SECONDARY"))
                .arg(output_arg().default_value("merged.csv")),
        )
        .subcommand(
            Command::new("combine-exams")
                .about("Merges exam exports per grade and exam type, then appends the groups with contacts")
                .arg(
                    Arg::new("inputs")
                        .required(true)
                        .num_args(1..)
                        .value_name("FILES_OR_DIRS"),
                )
                .arg(
                    Arg::new("contacts")
                        .long("contacts")
                        .value_name("DIR")
                        .help("Directory of contact sheets to attach"),
                )
                .arg(output_dir_arg()),
        )
        .subcommand(
            Command::new("combine")
                .about("Concatenates exports per grade and stream and drops repeated rows")
                .arg(
                    Arg::new("inputs")
                        .required(true)
                        .num_args(1..)
                        .value_name("FILES_OR_DIRS"),
                )
                .arg(output_dir_arg()),
        )
        .subcommand(
            Command::new("super40")
                .about("Ranks students by best-of-K scores and allocates the seats per class")
                .arg(Arg::new("file").required(true).value_name("FILE"))
                .arg(output_dir_arg()),
        )
}

fn output_dir_arg() -> Arg {
    Arg::new("output")
        .short('o')
        .long("output")
        .value_name("DIR")
        .help("Output directory (defaults to the configured one)")
}

fn output_arg() -> Arg {
    Arg::new("output")
        .short('o')
        .long("output")
        .value_name("FILE")
        .help("Output CSV path")
}

fn main() -> Result<()> {
    let matches = cli().get_matches();
    logging::init(matches.get_flag("verbose"));

    let config_file = required(&matches, "config")?;
    let config = load_or_create_config(config_file)?;

    match matches.subcommand() {
        Some(("merge", sub)) => run_merge(sub, &config),
        Some(("combine-exams", sub)) => run_combine_exams(sub, &config),
        Some(("combine", sub)) => run_combine(sub, &config),
        Some(("super40", sub)) => run_super40(sub, &config),
        _ => Err(anyhow!("unknown command")),
    }
}

fn load_or_create_config(config_file: &str) -> Result<Config> {
    if Path::new(config_file).exists() {
        println!("📋 Loading configuration from: {}", config_file);
        Config::load_from_file(config_file).with_context(|| format!("Failed to load {}", config_file))
    } else {
        println!("📝 Creating default configuration file: {}", config_file);
        let config = Config::default();
        config.save_to_file(config_file)?;
        Ok(config)
    }
}

fn required<'a>(matches: &'a ArgMatches, id: &str) -> Result<&'a String> {
    matches
        .get_one::<String>(id)
        .ok_or_else(|| anyhow!("missing argument `{}`", id))
}

/// Input paths with directories expanded to the table files inside them.
fn inputs(matches: &ArgMatches, reader: &TableReader) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for raw in matches.get_many::<String>("inputs").into_iter().flatten() {
        let path = PathBuf::from(clean_path(raw));
        if path.is_dir() {
            files.extend(reader.list_directory(&path)?);
        } else {
            files.push(path);
        }
    }
    Ok(files)
}

fn output_dir(matches: &ArgMatches, config: &Config) -> PathBuf {
    matches
        .get_one::<String>("output")
        .map(|d| PathBuf::from(clean_path(d)))
        .or_else(|| config.output_directory.as_ref().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Paths dropped onto a terminal come wrapped in quotes, prefixed with `& `
/// (PowerShell) or with escaped spaces.
fn clean_path(raw: &str) -> String {
    raw.trim()
        .trim_start_matches('&')
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .replace("\\ ", " ")
}

fn read(reader: &TableReader, path: &Path) -> Result<Table> {
    reader
        .read_file(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))
}

fn run_merge(matches: &ArgMatches, config: &Config) -> Result<()> {
    let reader = TableReader::new();
    let primary = read(&reader, Path::new(&clean_path(required(matches, "primary")?)))?;
    let secondary = read(&reader, Path::new(&clean_path(required(matches, "secondary")?)))?;
    let output = PathBuf::from(clean_path(required(matches, "output")?));

    let merged = merge::merge(&primary, &secondary, &config.join_key, &config.priority_columns)?;
    report::write_csv(&merged, &output)?;

    println!("📄 Total rows in first file: {}", primary.len());
    println!("📄 Total rows in second file: {}", secondary.len());
    println!("📄 Total rows in merged data: {}", merged.len());
    println!("🧭 Column order: {}", merged.headers().join(", "));
    println!("✅ Merged data has been written to {}", output.display());
    Ok(())
}

fn run_combine_exams(matches: &ArgMatches, config: &Config) -> Result<()> {
    let reader = TableReader::new();
    let output_dir = output_dir(matches, config);
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let groups = catalog::group_exam_files(&inputs(matches, &reader)?, &config.grades, &config.exam_types);
    if groups.is_empty() {
        println!("❌ No exam files matched any grade and exam type");
        return Ok(());
    }

    let mut merged = Vec::new();
    for group in &groups {
        println!("📄 Processing {} ({} files)", group.label(), group.files.len());
        match catalog::merge_group(group, &reader, config) {
            Some(table) => {
                let path = output_dir.join(format!("{}.csv", table.name()));
                report::write_csv(&table, &path)?;
                println!("   ✅ {} students merged into {}", table.len(), path.display());
                merged.push(table);
            }
            None => println!("   ❌ No data found for {}", group.label()),
        }
    }

    if merged.is_empty() {
        println!("❌ No exam data found");
        return Ok(());
    }

    let contacts = match matches.get_one::<String>("contacts") {
        Some(dir) => {
            let sources = reader.read_directory(Path::new(&clean_path(dir)))?;
            let contacts = merge::gather_contacts(&sources, &config.contact_columns, &config.join_key)?;
            println!("📇 {} contacts gathered from {} files", contacts.len(), sources.len());
            contacts
        }
        None => Table::empty("contacts", vec![config.join_key.clone()]),
    };
    let all = merge::append_with_contacts(&merged, &contacts, &config.join_key)?;

    let path = output_dir.join("all_merged_data.csv");
    report::write_csv(&all, &path)?;
    println!("✅ {} groups appended, {} students in {}", merged.len(), all.len(), path.display());
    Ok(())
}

fn run_combine(matches: &ArgMatches, config: &Config) -> Result<()> {
    let reader = TableReader::new();
    let output_dir = output_dir(matches, config);
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let categories = catalog::categorize_files(&inputs(matches, &reader)?, &config.grades, &config.streams);
    for (category, files) in &categories {
        println!("📄 Processing {} files...", category);
        let mut tables = Vec::new();
        for path in files {
            match reader.read_file(path) {
                Ok(table) => tables.push(table),
                Err(e) => println!("   ❌ Error reading {}: {}", path.display(), e),
            }
        }
        if tables.is_empty() {
            continue;
        }

        let combined = Table::concat(category.as_str(), &tables).distinct();
        let path = output_dir.join(format!("{}_combined.csv", category));
        report::write_csv(&combined, &path)?;
        println!("   ✅ Created {} ({} rows)", path.display(), combined.len());
    }
    Ok(())
}

fn run_super40(matches: &ArgMatches, config: &Config) -> Result<()> {
    let input = PathBuf::from(clean_path(required(matches, "file")?));
    let output_dir = output_dir(matches, config);

    let table = read(&TableReader::new(), &input)?;
    println!("📂 Columns in the file: {}", table.headers().join(", "));

    let analysis = Super40Analyzer::new(config).analyze(&table)?;
    for category in &analysis.categories {
        println!("🔎 {} columns: {}", category.category, category.score_columns.join(", "));
    }

    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "students".to_string());
    let written = report::write_selection(&analysis, config, &output_dir, &stem)?;

    println!("\n{}", report::selection_summary(&analysis, config));
    for path in written {
        println!("💾 Saved: {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_path_strips_drag_and_drop_noise() {
        assert_eq!(clean_path("& 'C:\\data\\marks.csv'"), "C:\\data\\marks.csv");
        assert_eq!(clean_path("\"/tmp/my file.csv\""), "/tmp/my file.csv");
        assert_eq!(clean_path("/tmp/my\\ file.csv "), "/tmp/my file.csv");
    }

    #[test]
    fn cli_definition_is_consistent() {
        cli().debug_assert();
    }
}
