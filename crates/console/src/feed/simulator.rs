//! Post simulation for demos.

use std::time::Duration;

use rand::seq::IndexedRandom;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{Analyzer, PostFeed};

/// Gap between simulated posts.
pub const SIMULATION_INTERVAL: Duration = Duration::from_millis(3001);

/// Sample messages posted by the simulator.
pub const SAMPLE_POSTS: &[&str] = &[
    "วันนี้อากาศดีจัง อยากไปเที่ยวทะเล 🌊",
    "รู้สึกเหนื่อยกับทุกอย่าง ไม่ไหวแล้ว...",
    "เพิ่งดูหนังเรื่องนี้จบ สนุกมาก! 🎬",
    "ทำไมชีวิตมันยากแบบนี้ อยากหายไปเลย",
    "กินข้าวกันครับทุกคน 🍛",
    "เบื่อโลก เบื่อผู้คน ไม่อยากตื่นมาเจอใคร",
    "วันนี้ทำงานเสร็จเร็ว ดีใจจัง",
    "ใครก็ได้ช่วยด้วย ไม่ไหวแล้วจริงๆ",
    "ฟังเพลงนี้แล้วคิดถึงแฟนเก่า 🎵 https://www.youtube.com/watch?v=cW8VLC9nnTo",
];

/// Handle to a running simulation.
#[derive(Debug)]
pub struct SimulationHandle {
    token: CancellationToken,
    task: tokio::task::JoinHandle<usize>,
}

impl SimulationHandle {
    /// Stop posting. Posts already submitted still receive their verdict.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Wait until the simulation stops and every submitted post settles.
    /// Returns the number of posts made.
    pub async fn join(self) -> usize {
        match self.task.await {
            Ok(posted) => posted,
            Err(e) => {
                warn!(error = %e, "Simulation task failed");
                0
            }
        }
    }
}

/// Post a random sample to `feed` every `period`, the first one after one
/// full period. Stops after `limit` posts when given, or when cancelled.
pub fn start_simulation<A: Analyzer>(
    feed: PostFeed<A>,
    period: Duration,
    limit: Option<usize>,
) -> SimulationHandle {
    let token = CancellationToken::new();
    let task = tokio::spawn(run(feed, period, limit, token.clone()));
    info!(period_ms = period.as_millis(), ?limit, "Simulation started");
    SimulationHandle { token, task }
}

fn pick_sample() -> Option<&'static str> {
    SAMPLE_POSTS.choose(&mut rand::rng()).copied()
}

async fn run<A: Analyzer>(
    feed: PostFeed<A>,
    period: Duration,
    limit: Option<usize>,
    token: CancellationToken,
) -> usize {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut in_flight = JoinSet::new();
    let mut posted = 0;

    while limit.is_none_or(|limit| posted < limit) {
        tokio::select! {
            biased;
            () = token.cancelled() => break,
            _ = ticker.tick() => {
                let Some(text) = pick_sample() else {
                    break;
                };
                let feed = feed.clone();
                in_flight.spawn(async move { feed.submit_simulated(text).await });
                posted += 1;
            }
        }
    }

    while let Some(joined) = in_flight.join_next().await {
        if let Err(e) = joined {
            warn!(error = %e, "Simulated post task failed");
        }
    }
    debug!(posted, "Simulation stopped");
    posted
}
