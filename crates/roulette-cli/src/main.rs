//! Marble Roulette CLI
//!
//! Headless host for the race orchestrator: drives frames from a tokio
//! interval (or a virtual clock), logs race events and optionally captures
//! snapshots as JSON lines.

use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::Parser;
use roulette_core::{
    FollowCamera, RaceEvent, RacePhase, RapierPhysics, Recorder, ReplayState, Roulette,
    builtin_stages,
};
use tokio::time::{Interval, MissedTickBehavior};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::Args;
use crate::output::{SnapshotRecorder, SnapshotWriter};

mod cli;
mod output;

const FRAME_MS: u64 = 16;

type Race = Roulette<RapierPhysics, FollowCamera, SnapshotRecorder>;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    if args.list_maps {
        for (index, stage) in builtin_stages().iter().enumerate() {
            println!("{index}: {}", stage.title);
        }
        return Ok(());
    }

    let names = args.name_lines()?;
    if names.is_empty() {
        bail!("no marble names given");
    }
    let options = args.options()?;
    let seed = options.seed.unwrap_or_else(rand::random);

    let (mut writer, recorder) = match &args.record {
        Some(path) => SnapshotWriter::create(path)
            .with_context(|| format!("create snapshot file {}", path.display()))?,
        None => SnapshotWriter::disabled(),
    };

    let mut roulette: Race = Roulette::with_parts(
        RapierPhysics::new(),
        FollowCamera::new(),
        recorder,
        builtin_stages(),
        seed,
    );
    roulette.set_marbles(names.as_slice());
    roulette.apply_options(&options)?;
    tracing::info!(
        seed,
        marbles = roulette.count(),
        map = roulette.current_stage().map(|s| s.title.as_str()),
        "[cli] Roster ready"
    );

    roulette.start(options.race_config())?;
    let race_limit = if options.infinite_loop {
        args.max_races
    } else {
        Some(1)
    };
    run(&mut roulette, &mut writer, &args, race_limit).await;

    writer.finish().context("flush snapshot file")?;
    Ok(())
}

async fn run(
    roulette: &mut Race,
    writer: &mut SnapshotWriter,
    args: &Args,
    race_limit: Option<usize>,
) {
    let mut interval = tokio::time::interval(Duration::from_millis(FRAME_MS));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let clock = Instant::now();
    let mut frame: u64 = 0;
    let mut finished = 0;
    let mut race_started_ms = 0.0;
    #[allow(clippy::cast_precision_loss)]
    let timeout_ms = (args.timeout_secs * 1000) as f64;

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("[cli] Interrupted");
                break;
            }
            () = pace(&mut interval, args.virtual_time) => {}
        }

        #[allow(clippy::cast_precision_loss)]
        let now_ms = if args.virtual_time {
            (frame * FRAME_MS) as f64
        } else {
            clock.elapsed().as_secs_f64() * 1000.0
        };
        frame += 1;

        let was_running = roulette.is_running();
        roulette.frame(now_ms, writer);
        if !was_running && roulette.is_running() {
            race_started_ms = now_ms;
        }

        for event in roulette.drain_events() {
            match &event {
                RaceEvent::Goal { winner } => {
                    finished += 1;
                    tracing::info!(race = finished, winner = %winner.display(), "[cli] Winner");
                }
                RaceEvent::StartCountdown { seconds, .. } => {
                    tracing::info!(seconds, "[cli] Next race countdown");
                }
                RaceEvent::ShakeAvailableChanged { available: true } if args.auto_shake => {
                    if roulette.shake() {
                        tracing::info!("[cli] Shook the pack");
                    }
                }
                other => tracing::debug!(event = ?other, "[cli] Event"),
            }
        }

        if race_limit.is_some_and(|limit| finished >= limit)
            && roulette.phase() == RacePhase::Finished
        {
            if roulette.recorder().is_armed() {
                continue;
            }
            if roulette.replay_state() == ReplayState::CountdownPending {
                roulette.stop_infinite_loop();
            }
            break;
        }

        if roulette.is_running() && now_ms - race_started_ms > timeout_ms {
            tracing::warn!(
                remaining = roulette.count(),
                "[cli] Race timed out"
            );
            break;
        }
    }
}

async fn pace(interval: &mut Interval, virtual_time: bool) {
    if virtual_time {
        tokio::task::yield_now().await;
    } else {
        interval.tick().await;
    }
}
