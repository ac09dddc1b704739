use crate::model::DayRecord;
use crate::stats::Accumulator;
use anyhow::{Context, Result, bail};
use glob::glob;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Expected header of every trajectory table.
const TRAJECTORY_HEADER: [&str; 5] = ["t", "S", "E", "I", "R"];

#[derive(Debug, Serialize)]
struct MeanRecord {
    t: u32,
    #[serde(rename = "S_mean")]
    s_mean: f64,
    #[serde(rename = "E_mean")]
    e_mean: f64,
    #[serde(rename = "I_mean")]
    i_mean: f64,
    #[serde(rename = "R_mean")]
    r_mean: f64,
}

#[derive(Debug, Serialize)]
struct PeakRecord {
    rep: String,
    day_peak: usize,
    #[serde(rename = "peak_I")]
    peak_i: u32,
}

struct Trajectory {
    rep: String,
    rec_vec: Vec<DayRecord>,
}

/// Merges replicated trajectory tables and extracts epidemic peaks.
pub struct Analyzer {
    traj_vec: Vec<Trajectory>,
}

impl Analyzer {
    pub fn new() -> Self {
        Self {
            traj_vec: Vec::new(),
        }
    }

    /// Read one replication's trajectory table.
    ///
    /// # Errors
    /// Rejects tables whose header deviates from `t,S,E,I,R`, whose day
    /// column is not contiguous from 0, or which hold no records.
    pub fn add_file<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let file = file.as_ref();
        let mut reader =
            csv::Reader::from_path(file).with_context(|| format!("failed to open {file:?}"))?;

        let headers = reader.headers().context("failed to read headers")?.clone();
        let header_vec: Vec<&str> = headers.iter().collect();
        if header_vec != TRAJECTORY_HEADER {
            bail!("header must be {TRAJECTORY_HEADER:?}, but is {header_vec:?}");
        }

        let mut rec_vec = Vec::new();
        for (i_rec, result) in reader.deserialize().enumerate() {
            let rec: DayRecord =
                result.with_context(|| format!("failed to parse record {i_rec}"))?;
            if rec.t as usize != i_rec {
                bail!("day column must be contiguous from 0, but record {i_rec} has t = {}", rec.t);
            }
            rec_vec.push(rec);
        }
        if rec_vec.is_empty() {
            bail!("trajectory {file:?} has no records");
        }

        let rep = file
            .file_stem()
            .and_then(|stem| stem.to_str())
            .context("file name is not valid UTF-8")?
            .to_string();
        self.traj_vec.push(Trajectory { rep, rec_vec });

        Ok(())
    }

    /// Write the per-day mean across all replications
    /// (columns `t,S_mean,E_mean,I_mean,R_mean`).
    pub fn save_mean_trajectory<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let n_traj = self.traj_vec.len();
        if n_traj == 0 {
            bail!("no trajectories to average");
        }
        let n_recs = self.traj_vec[0].rec_vec.len();
        if self.traj_vec.iter().any(|traj| traj.rec_vec.len() != n_recs) {
            bail!("replications must cover the same number of days");
        }

        let file = file.as_ref();
        let mut writer =
            csv::Writer::from_path(file).with_context(|| format!("failed to create {file:?}"))?;

        for i_rec in 0..n_recs {
            let mut sums = [0.0; 4];
            for traj in &self.traj_vec {
                let rec = &traj.rec_vec[i_rec];
                sums[0] += f64::from(rec.s);
                sums[1] += f64::from(rec.e);
                sums[2] += f64::from(rec.i);
                sums[3] += f64::from(rec.r);
            }
            writer
                .serialize(MeanRecord {
                    t: i_rec as u32,
                    s_mean: sums[0] / n_traj as f64,
                    e_mean: sums[1] / n_traj as f64,
                    i_mean: sums[2] / n_traj as f64,
                    r_mean: sums[3] / n_traj as f64,
                })
                .context("failed to write record")?;
        }

        writer.flush().context("failed to flush writer stream")?;

        Ok(())
    }

    /// Write one `rep,day_peak,peak_I` row per replication and log a summary
    /// of the peak distribution across replications.
    pub fn save_peaks<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        if self.traj_vec.is_empty() {
            bail!("no trajectories to scan");
        }

        let file = file.as_ref();
        let mut writer =
            csv::Writer::from_path(file).with_context(|| format!("failed to create {file:?}"))?;

        let mut day_acc = Accumulator::new();
        let mut height_acc = Accumulator::new();

        for traj in &self.traj_vec {
            let i_vec: Vec<u32> = traj.rec_vec.iter().map(|rec| rec.i).collect();
            let (day_peak, peak_i) =
                first_local_peak(&i_vec).context("trajectory has no records")?;

            day_acc.add(day_peak as f64);
            height_acc.add(f64::from(peak_i));

            writer
                .serialize(PeakRecord {
                    rep: traj.rep.clone(),
                    day_peak,
                    peak_i,
                })
                .context("failed to write record")?;
        }

        writer.flush().context("failed to flush writer stream")?;

        let day_report = day_acc.report();
        let height_report = height_acc.report();
        log::info!(
            "peak day over {} replications: mean {:.2}, std dev {:.2}, min {}, max {}",
            day_report.n_vals,
            day_report.mean,
            day_report.std_dev,
            day_report.min,
            day_report.max
        );
        log::info!(
            "peak height: mean {:.2}, std dev {:.2}, min {}, max {}",
            height_report.mean,
            height_report.std_dev,
            height_report.min,
            height_report.max
        );

        Ok(())
    }
}

/// First epidemic peak of an infectious column: the smallest `t` with
/// `I[t-1] < I[t] >= I[t+1]`. When no interior local maximum exists the
/// first global-maximum index is returned instead. `None` on an empty
/// series.
pub fn first_local_peak(i_vec: &[u32]) -> Option<(usize, u32)> {
    for t in 1..i_vec.len().saturating_sub(1) {
        if i_vec[t - 1] < i_vec[t] && i_vec[t] >= i_vec[t + 1] {
            return Some((t, i_vec[t]));
        }
    }

    let mut t_max = 0;
    let mut max = *i_vec.first()?;
    for (t, &val) in i_vec.iter().enumerate().skip(1) {
        if val > max {
            t_max = t;
            max = val;
        }
    }
    Some((t_max, max))
}

/// Discover replication tables under `data_dir` by `pattern`, then write
/// `mean-trajectory.csv` and `peaks.csv` beside them.
pub fn run_analysis<P: AsRef<Path>>(data_dir: P, pattern: &str) -> Result<()> {
    let data_dir = data_dir.as_ref();
    let full_pattern = data_dir.join(pattern);
    let full_pattern = full_pattern.to_str().context("pattern is not valid UTF-8")?;

    let mut file_vec: Vec<PathBuf> = glob(full_pattern)
        .context("failed to glob trajectory files")?
        .filter_map(Result::ok)
        .collect();
    file_vec.sort();

    if file_vec.is_empty() {
        bail!("no trajectory files match {full_pattern:?}");
    }

    let mut analyzer = Analyzer::new();
    for file in &file_vec {
        analyzer
            .add_file(file)
            .with_context(|| format!("failed to add {file:?}"))?;
        log::info!("added {file:?}");
    }

    analyzer
        .save_mean_trajectory(data_dir.join("mean-trajectory.csv"))
        .context("failed to save mean trajectory")?;
    analyzer
        .save_peaks(data_dir.join("peaks.csv"))
        .context("failed to save peaks")?;

    Ok(())
}
