//! Process settings.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::cache::ClusterConnection;
use crate::scheduler::CycleMode;

/// vsched batch scheduler.
#[derive(Debug, Clone, Parser)]
#[command(name = "scheduler")]
#[command(author, version, about, long_about = None)]
pub struct Settings {
    /// Cluster API server address; overrides the one in the kubeconfig.
    #[arg(long, env = "VSCHED_MASTER")]
    pub master: Option<String>,

    /// Cluster credentials file.
    #[arg(long, env = "VSCHED_KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Name jobs use to select this scheduler.
    #[arg(long, env = "VSCHED_SCHEDULER_NAME", default_value = "vsched")]
    pub scheduler_name: String,

    /// Scheduling policy file. Empty means the built-in policy.
    #[arg(long, env = "VSCHED_SCHEDULER_CONF")]
    pub scheduler_conf: Option<PathBuf>,

    /// Interval between scheduling cycles.
    #[arg(
        long,
        env = "VSCHED_SCHEDULE_PERIOD_MS",
        default_value_t = 1000,
        value_parser = clap::value_parser!(u64).range(10..)
    )]
    pub schedule_period_ms: u64,

    /// Queue for jobs that do not name one.
    #[arg(long, env = "VSCHED_DEFAULT_QUEUE", default_value = "default")]
    pub default_queue: String,

    /// Drop ticks while a cycle is still running.
    #[arg(long, env = "VSCHED_SKIP_IF_BUSY")]
    pub skip_if_busy: bool,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, env = "VSCHED_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Settings {
    pub fn schedule_period(&self) -> Duration {
        Duration::from_millis(self.schedule_period_ms)
    }

    pub fn cycle_mode(&self) -> CycleMode {
        if self.skip_if_busy {
            CycleMode::SkipIfBusy
        } else {
            CycleMode::Overlap
        }
    }

    pub fn connection(&self) -> ClusterConnection {
        ClusterConnection {
            master: self.master.clone(),
            kubeconfig: self.kubeconfig.clone(),
        }
    }
}
