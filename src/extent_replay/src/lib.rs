use std::{fs, str::FromStr};

use anyhow::Context;
use clap::{Arg, ArgMatches, Command};
use extent_map::{Extent, ExtentMap, ExtentMapConfig};
use logger::LevelFilter;

pub mod trace;

use trace::{load_trace, Triple};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => anyhow::bail!("unknown output format {:?}", other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReplaySummary {
    pub triples: usize,
    pub extents: usize,
    pub mapped_blocks: u64,
}

pub fn replay_main() -> anyhow::Result<()> {
    let matches = Command::new("extent-replay")
        .about("Replays (lba, pba, len) traces into an extent map")
        .arg(
            Arg::new("v")
                .multiple_occurrences(true)
                .short('v')
                .help("Raise the log level (info, debug, trace)"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .takes_value(true)
                .help("JSON extent map configuration"),
        )
        .arg(
            Arg::new("snapshot")
                .long("snapshot")
                .takes_value(true)
                .help("JSON array of sorted extents to load before replaying"),
        )
        .arg(
            Arg::new("max-extents")
                .long("max-extents")
                .takes_value(true)
                .help("Refuse updates that could grow the map past this many extents"),
        )
        .arg(
            Arg::new("validate-each")
                .long("validate-each")
                .help("Validate the whole map after every update"),
        )
        .arg(
            Arg::new("passes")
                .long("passes")
                .short('p')
                .takes_value(true)
                .default_value("1")
                .help("Number of times each trace is replayed"),
        )
        .arg(
            Arg::new("output")
                .long("output")
                .short('o')
                .takes_value(true)
                .possible_values(["text", "json"])
                .default_value("text"),
        )
        .arg(
            Arg::new("trace")
                .required(true)
                .takes_value(true)
                .multiple_values(true)
                .help("Trace files, one triple per line"),
        )
        .get_matches();

    let installed = match matches.occurrences_of("v") {
        0 => logger::init_from_env(),
        1 => logger::init(LevelFilter::Info),
        2 => logger::init(LevelFilter::Debug),
        _ => logger::init(LevelFilter::Trace),
    };
    installed.map_err(|_| anyhow::anyhow!("failed to set log level"))?;

    let config = load_config(&matches)?;
    let passes: usize = matches
        .value_of("passes")
        .unwrap()
        .parse()
        .context("invalid --passes")?;
    let output = OutputFormat::from_str(matches.value_of("output").unwrap())?;

    let mut map = ExtentMap::with_config(config);
    logger::info!("extent map config: {:?}", map.config());
    if let Some(path) = matches.value_of("snapshot") {
        let snapshot = load_snapshot(path)?;
        map.import_sorted(&snapshot)
            .with_context(|| format!("failed to import snapshot {}", path))?;
        logger::info!("loaded {} extents from {}", snapshot.len(), path);
    }

    let mut summary = ReplaySummary::default();
    for path in matches.values_of("trace").unwrap() {
        let triples = load_trace(path)?;
        logger::info!("replaying {} triples from {}", triples.len(), path);
        for pass in 0..passes {
            logger::debug!("{}: pass {}", path, pass + 1);
            summary.triples += replay(&mut map, &triples)
                .with_context(|| format!("failed to replay {}", path))?;
        }
    }
    map.validate()
        .context("extent map failed validation after replay")?;
    summary.extents = map.len();
    summary.mapped_blocks = map.mapped_blocks();

    print!("{}", render(&map, output)?);
    eprintln!(
        "{} updates applied, {} extents, {} mapped blocks",
        summary.triples, summary.extents, summary.mapped_blocks
    );
    Ok(())
}

fn load_config(matches: &ArgMatches) -> anyhow::Result<ExtentMapConfig> {
    let mut config = match matches.value_of("config") {
        Some(path) => {
            let s = fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path))?;
            serde_json::from_str(&s).with_context(|| format!("invalid config {}", path))?
        }
        None => ExtentMapConfig::default(),
    };
    if let Some(max) = matches.value_of("max-extents") {
        config.max_extents = Some(max.parse().context("invalid --max-extents")?);
    }
    if matches.is_present("validate-each") {
        config.validate_on_update = true;
    }
    Ok(config)
}

fn load_snapshot(path: &str) -> anyhow::Result<Vec<Extent>> {
    let s = fs::read_to_string(path).with_context(|| format!("failed to read snapshot {}", path))?;
    serde_json::from_str(&s).with_context(|| format!("invalid snapshot {}", path))
}

/// Applies `triples` in order and returns how many were applied.
pub fn replay(map: &mut ExtentMap, triples: &[Triple]) -> anyhow::Result<usize> {
    for t in triples {
        logger::debug!("update_range(lba: {} pba: {} len: {})", t.lba, t.pba, t.len);
        map.update_range(t.lba, t.pba, t.len)
            .with_context(|| format!("line {}: update rejected", t.line))?;
    }
    Ok(triples.len())
}

/// Renders the map as `lba pba len` lines or as a JSON array of extents.
pub fn render(map: &ExtentMap, output: OutputFormat) -> anyhow::Result<String> {
    match output {
        OutputFormat::Text => Ok(map
            .iter()
            .map(|e| format!("{} {} {}\n", e.lba, e.pba, e.len))
            .collect()),
        OutputFormat::Json => {
            let extents: Vec<&Extent> = map.iter().collect();
            let mut s = serde_json::to_string_pretty(&extents)?;
            s.push('\n');
            Ok(s)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::parse_trace;

    #[test]
    fn replay_twice_is_stable() {
        let triples = parse_trace("0 100 20\n5 500 5\n30 900 10\n10 110 4\n").unwrap();
        let mut map =
            ExtentMap::with_config(ExtentMapConfig::default().with_validate_on_update(true));
        assert_eq!(replay(&mut map, &triples).unwrap(), 4);
        let once = render(&map, OutputFormat::Text).unwrap();
        assert_eq!(once, "0 100 5\n5 500 5\n10 110 10\n30 900 10\n");
        replay(&mut map, &triples).unwrap();
        assert_eq!(render(&map, OutputFormat::Text).unwrap(), once);
    }

    #[test]
    fn replay_reports_line() {
        let triples = parse_trace("0 100 20\n\n40 400 5\n").unwrap();
        let mut map = ExtentMap::with_config(ExtentMapConfig::default().with_max_extents(1));
        let err = replay(&mut map, &triples).unwrap_err();
        assert!(format!("{:#}", err).contains("line 3: update rejected"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn render_json() {
        let mut map = ExtentMap::new();
        map.update_range(4, 40, 2).unwrap();
        let s = render(&map, OutputFormat::Json).unwrap();
        let back: Vec<Extent> = serde_json::from_str(&s).unwrap();
        assert_eq!(back, vec![Extent::new(4, 40, 2)]);
    }

    #[test]
    fn output_format() {
        assert_eq!(OutputFormat::from_str("json").unwrap(), OutputFormat::Json);
        assert_eq!(OutputFormat::from_str("text").unwrap(), OutputFormat::Text);
        assert!(OutputFormat::from_str("yaml").is_err());
    }
}
