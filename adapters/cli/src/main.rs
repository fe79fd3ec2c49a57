#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Headless command-line host for the Crystal Defence battle engine.

mod battle_file;
mod share_code;

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use crystal_defence_battle::BattleManager;
use crystal_defence_core::{BattleStatistics, ReplayData, INNER_FRAMES_PER_LOGIC_FRAME};
use crystal_defence_replay::{ReplayManager, ReplayStore};
use tracing_subscriber::EnvFilter;

use battle_file::BattleFile;

/// Inner frames simulated per second of battle time.
const INNER_FRAMES_PER_SECOND: u64 = 50;
/// Extra logic frames granted when re-running a replay.
const VERIFY_SLACK_FRAMES: u64 = 10;

#[derive(Parser)]
#[command(author, version, about = "Headless Crystal Defence battles", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Simulate a battle until it is decided
    Run {
        /// TOML battle description
        #[arg(long)]
        config: Option<PathBuf>,
        /// Overrides the seed from the battle file
        #[arg(long)]
        seed: Option<u32>,
        /// Upper bound on simulated battle time
        #[arg(long, default_value_t = 600)]
        max_seconds: u64,
        /// Stores a replay of the battle in this directory
        #[arg(long)]
        record: Option<PathBuf>,
        /// Gzip the stored replay
        #[arg(long, requires = "record")]
        compress: bool,
    },
    /// List the replays stored in a directory
    Replays { dir: PathBuf },
    /// Re-run a replay file and check it reaches the recorded outcome
    Verify {
        file: PathBuf,
        /// Battle file whose settings the replay was recorded with
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print a share code for a replay file
    Share { file: PathBuf },
    /// Store the replay carried by a share code
    Import {
        code: String,
        /// Replay directory
        #[arg(long, default_value = "replays")]
        store: PathBuf,
    },
}

/// Entry point for the Crystal Defence command-line interface.
fn main() -> Result<()> {
    init_tracing();
    match Cli::parse().cmd {
        Cmd::Run {
            config,
            seed,
            max_seconds,
            record,
            compress,
        } => run(config.as_deref(), seed, max_seconds, record, compress),
        Cmd::Replays { dir } => list(&dir),
        Cmd::Verify { file, config } => verify(&file, config.as_deref()),
        Cmd::Share { file } => share(&file),
        Cmd::Import { code, store } => import(&code, store),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

fn load_battle_file(config: Option<&Path>) -> Result<BattleFile> {
    let Some(path) = config else {
        return Ok(BattleFile::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("read battle file: {}", path.display()))?;
    let file = BattleFile::parse(&text)
        .with_context(|| format!("parse battle file: {}", path.display()))?;
    tracing::debug!(path = %path.display(), "battle file loaded");
    Ok(file)
}

fn run(
    config: Option<&Path>,
    seed: Option<u32>,
    max_seconds: u64,
    record: Option<PathBuf>,
    compress: bool,
) -> Result<()> {
    let (params, settings) = load_battle_file(config)?.into_parts(seed);

    let mut battle = BattleManager::new(settings);
    battle.init_battle(params.clone()).context("initialise battle")?;
    let mut recorder = ReplayManager::new();
    if record.is_some() {
        let replay_id = battle.replay().replay_id.clone();
        let _ = recorder.start_recording(battle.events_mut(), replay_id, params);
    }

    if !battle.start_battle() {
        bail!("battle refused to start");
    }
    let result = battle.run_to_completion(max_seconds.saturating_mul(INNER_FRAMES_PER_SECOND));
    match result {
        Some(result) => println!("result: {result:?}"),
        None => println!("result: undecided after {max_seconds}s"),
    }
    print_statistics(&battle.statistics());

    if let Some(dir) = record {
        let replay = recorder
            .stop_recording(battle.events_mut())
            .context("recording was not running")?;
        let path = ReplayStore::new(dir)
            .save(&replay, compress)
            .context("store replay")?;
        println!("replay: {}", path.display());
    }
    Ok(())
}

fn print_statistics(statistics: &BattleStatistics) {
    println!("logic frames: {}", statistics.logic_frames);
    println!("duration: {} ms", statistics.duration_ms);
    println!(
        "enemies: {} spawned, {} defeated",
        statistics.enemies_spawned, statistics.total_enemies_defeated
    );
    println!(
        "damage: {:.0} dealt, {:.0} healed, {} critical, {} evaded",
        statistics.damage_dealt,
        statistics.healing_done,
        statistics.critical_hits,
        statistics.evasions
    );
    println!("commands: {}", statistics.commands_processed);
}

fn list(dir: &Path) -> Result<()> {
    let summaries = ReplayStore::new(dir)
        .list()
        .with_context(|| format!("list replays: {}", dir.display()))?;
    if summaries.is_empty() {
        println!("no replays in {}", dir.display());
    }
    for summary in summaries {
        let result = summary
            .metadata
            .result
            .map_or_else(|| "undecided".to_owned(), |result| format!("{result:?}"));
        println!(
            "{}  c{}s{}  {} frames  {} commands  {}{}",
            summary.replay_id,
            summary.metadata.chapter,
            summary.metadata.stage,
            summary.metadata.total_frames,
            summary.command_count,
            result,
            if summary.compressed { "  (gz)" } else { "" }
        );
    }
    Ok(())
}

fn read_replay(file: &Path) -> Result<ReplayData> {
    let bytes = fs::read(file).with_context(|| format!("read replay: {}", file.display()))?;
    crystal_defence_replay::decode(&bytes)
        .with_context(|| format!("decode replay: {}", file.display()))
}

fn verify(file: &Path, config: Option<&Path>) -> Result<()> {
    let replay = read_replay(file)?;
    let (_, settings) = load_battle_file(config)?.into_parts(None);
    let frames = replay
        .metadata
        .total_frames
        .saturating_add(VERIFY_SLACK_FRAMES)
        .saturating_mul(INNER_FRAMES_PER_LOGIC_FRAME);
    let rerun = BattleManager::resimulate(&replay, settings, frames)
        .context("resimulate replay")?;

    let Some(expected) = replay.metadata.result else {
        println!(
            "replay {} has no recorded outcome; resimulated {} frames",
            replay.replay_id,
            rerun.logic_frame()
        );
        return Ok(());
    };
    let actual = rerun.result();
    if actual != Some(expected) || rerun.logic_frame() != replay.metadata.total_frames {
        bail!(
            "replay {} diverged: recorded {expected:?} at frame {}, resimulated {actual:?} at frame {}",
            replay.replay_id,
            replay.metadata.total_frames,
            rerun.logic_frame()
        );
    }
    println!(
        "replay {} verified: {expected:?} at frame {}",
        replay.replay_id, replay.metadata.total_frames
    );
    Ok(())
}

fn share(file: &Path) -> Result<()> {
    let replay = read_replay(file)?;
    println!("{}", share_code::encode(&replay)?);
    Ok(())
}

fn import(code: &str, store: PathBuf) -> Result<()> {
    let replay = share_code::decode(code).context("decode share code")?;
    let path = ReplayStore::new(store)
        .save(&replay, false)
        .context("store replay")?;
    println!("replay: {}", path.display());
    Ok(())
}
