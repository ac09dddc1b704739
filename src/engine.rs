use crate::config::Config;
use crate::grid::InfGrid;
use crate::model::{Census, Compartment, Population};
use anyhow::{Context, Result};
use rand::distr::Uniform;
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use std::{fs, path::Path};

/// Simulation engine.
///
/// Owns the population, the infectious-count grid, and the random number
/// generator, and advances the model one day at a time. Every stochastic
/// decision consumes the single ChaCha12 stream in a fixed order, so a given
/// seed reproduces a run bit for bit.
pub struct Engine {
    cfg: Config,
    pop: Population,
    grid: InfGrid,
    rng: ChaCha12Rng,
    cell_dist: Uniform<u16>,
    order_vec: Vec<usize>,
    day: u32,
}

/// Inverse-CDF exponential draw: `-mean * ln(1 - U)`, `U ~ Uniform[0,1)`.
///
/// Written out rather than taken from a library sampler so the transform
/// consumes exactly one uniform draw; every downstream draw in the stream
/// (and with it the whole trajectory) depends on that.
fn neg_exp(rng: &mut ChaCha12Rng, mean: f64) -> f64 {
    let u: f64 = rng.random();
    -mean * (1.0 - u).ln()
}

impl Engine {
    /// Create a new `Engine` with a freshly initialized population.
    ///
    /// Compartment labels are laid out in S/E/I/R blocks and permuted once,
    /// so the initially infectious agents are not clustered by index order.
    /// Dwell durations are then drawn per agent (dE, dI, dR), then positions
    /// (x, y), in that order on the same stream. The initial compartment
    /// counts are taken as-is; [`Config::from_file`] has already checked
    /// that they sum to the population size.
    pub fn generate_initial_population(cfg: Config, seed: u64) -> Result<Self> {
        let mut rng = ChaCha12Rng::seed_from_u64(seed);
        let n_agt = cfg.init.n_agents;

        let mut state_vec: Vec<Compartment> = Vec::with_capacity(n_agt);
        for (count, state) in [
            (cfg.init.n_susceptible, Compartment::Susceptible),
            (cfg.init.n_exposed, Compartment::Exposed),
            (cfg.init.n_infectious, Compartment::Infectious),
            (cfg.init.n_removed, Compartment::Removed),
        ] {
            state_vec.extend(std::iter::repeat_n(state, count));
        }
        state_vec.shuffle(&mut rng);

        let mut dwell_exp = Vec::with_capacity(n_agt);
        let mut dwell_inf = Vec::with_capacity(n_agt);
        let mut dwell_rem = Vec::with_capacity(n_agt);
        for _ in 0..n_agt {
            dwell_exp.push(neg_exp(&mut rng, cfg.model.mean_dwell_exp));
            dwell_inf.push(neg_exp(&mut rng, cfg.model.mean_dwell_inf));
            dwell_rem.push(neg_exp(&mut rng, cfg.model.mean_dwell_rem));
        }

        let cell_dist = Uniform::new(0, cfg.model.grid_side)
            .context("failed to construct cell distribution")?;

        let mut pos_x = Vec::with_capacity(n_agt);
        let mut pos_y = Vec::with_capacity(n_agt);
        for _ in 0..n_agt {
            pos_x.push(cell_dist.sample(&mut rng));
            pos_y.push(cell_dist.sample(&mut rng));
        }

        let mut grid = InfGrid::new(cfg.model.grid_side);
        for i_agt in 0..n_agt {
            if state_vec[i_agt] == Compartment::Infectious {
                grid.incr(pos_x[i_agt], pos_y[i_agt]);
            }
        }

        let pop = Population {
            state_vec,
            pos_x,
            pos_y,
            days_in_state: vec![0; n_agt],
            dwell_exp,
            dwell_inf,
            dwell_rem,
        };

        Ok(Self {
            cfg,
            pop,
            grid,
            rng,
            cell_dist,
            order_vec: (0..n_agt).collect(),
            day: 0,
        })
    }

    /// Advance the simulation `n_days` days and write the trajectory table
    /// to `file`: the day-0 snapshot followed by one record per day.
    pub fn run<P: AsRef<Path>>(&mut self, n_days: u32, file: P) -> Result<()> {
        let file = file.as_ref();
        if let Some(dir) = file.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir).with_context(|| format!("failed to create {dir:?}"))?;
        }
        let mut writer =
            csv::Writer::from_path(file).with_context(|| format!("failed to create {file:?}"))?;

        let census = self.census();
        debug_assert_eq!(census.sum() as usize, self.cfg.init.n_agents);
        debug_assert_eq!(self.grid.total(), census.n_inf);
        writer
            .serialize(census.record(self.day))
            .context("failed to write record")?;

        let log_stride = (n_days / 10).max(1);
        for i_day in 0..n_days {
            self.step_day();

            let census = self.census();
            debug_assert_eq!(census.sum() as usize, self.cfg.init.n_agents);
            debug_assert_eq!(self.grid.total(), census.n_inf);
            writer
                .serialize(census.record(self.day))
                .context("failed to write record")?;

            if (i_day + 1) % log_stride == 0 || i_day + 1 == n_days {
                let progress = 100.0 * f64::from(i_day + 1) / f64::from(n_days);
                log::info!("completed {progress:06.2}%");
            }
        }

        writer.flush().context("failed to flush writer stream")?;

        Ok(())
    }

    /// Run one full day: a fresh random processing order, then every agent
    /// stepped in that order. Agents later in the order observe the
    /// mutations made by agents processed earlier the same day.
    pub fn step_day(&mut self) {
        let mut order_vec = std::mem::take(&mut self.order_vec);
        order_vec.shuffle(&mut self.rng);

        for &i_agt in &order_vec {
            self.step_agent(i_agt);
        }

        self.order_vec = order_vec;
        self.day += 1;
    }

    /// One agent, one day: movement, aging, then at most one transition.
    fn step_agent(&mut self, i_agt: usize) {
        let pop = &mut self.pop;

        // Global jump to a uniformly random cell. One redraw avoids a
        // same-cell target; a second coincidence stands.
        let old_x = pop.pos_x[i_agt];
        let old_y = pop.pos_y[i_agt];
        let mut new_x = self.cell_dist.sample(&mut self.rng);
        let mut new_y = self.cell_dist.sample(&mut self.rng);
        if new_x == old_x && new_y == old_y {
            new_x = self.cell_dist.sample(&mut self.rng);
            new_y = self.cell_dist.sample(&mut self.rng);
        }

        let moved = new_x != old_x || new_y != old_y;
        if moved && pop.state_vec[i_agt] == Compartment::Infectious {
            self.grid.decr(old_x, old_y);
            self.grid.incr(new_x, new_y);
        }
        pop.pos_x[i_agt] = new_x;
        pop.pos_y[i_agt] = new_y;

        pop.days_in_state[i_agt] += 1;

        // Transitions use the post-movement position. Dwell comparisons are
        // strict, integer day count against real threshold.
        match pop.state_vec[i_agt] {
            Compartment::Susceptible => {
                let pressure = self.grid.pressure(new_x, new_y);
                if pressure > 0 {
                    let prob = 1.0 - (-self.cfg.model.inf_force * f64::from(pressure)).exp();
                    if self.rng.random::<f64>() < prob {
                        pop.state_vec[i_agt] = Compartment::Exposed;
                        pop.days_in_state[i_agt] = 0;
                    }
                }
            }
            Compartment::Exposed => {
                if f64::from(pop.days_in_state[i_agt]) > pop.dwell_exp[i_agt] {
                    pop.state_vec[i_agt] = Compartment::Infectious;
                    pop.days_in_state[i_agt] = 0;
                    self.grid.incr(new_x, new_y);
                }
            }
            Compartment::Infectious => {
                if f64::from(pop.days_in_state[i_agt]) > pop.dwell_inf[i_agt] {
                    pop.state_vec[i_agt] = Compartment::Removed;
                    pop.days_in_state[i_agt] = 0;
                    self.grid.decr(new_x, new_y);
                }
            }
            Compartment::Removed => {
                if f64::from(pop.days_in_state[i_agt]) > pop.dwell_rem[i_agt] {
                    pop.state_vec[i_agt] = Compartment::Susceptible;
                    pop.days_in_state[i_agt] = 0;
                }
            }
        }
    }

    pub fn census(&self) -> Census {
        self.pop.census()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InitConfig, ModelConfig};

    fn small_config() -> Config {
        Config {
            model: ModelConfig {
                grid_side: 8,
                mean_dwell_exp: 2.0,
                mean_dwell_inf: 4.0,
                mean_dwell_rem: 30.0,
                inf_force: 0.5,
            },
            init: InitConfig {
                n_agents: 200,
                n_susceptible: 180,
                n_exposed: 5,
                n_infectious: 15,
                n_removed: 0,
            },
        }
    }

    #[test]
    fn conservation_and_grid_consistency() {
        let cfg = small_config();
        let n_agt = cfg.init.n_agents as u32;
        let mut engine = Engine::generate_initial_population(cfg, 7).unwrap();

        assert_eq!(engine.census().sum(), n_agt);
        assert_eq!(engine.grid.total(), engine.census().n_inf);

        for _ in 0..30 {
            engine.step_day();
            let census = engine.census();
            assert_eq!(census.sum(), n_agt);
            assert_eq!(engine.grid.total(), census.n_inf);
        }
    }

    #[test]
    fn same_seed_reproduces_the_trajectory() {
        let mut engine_a = Engine::generate_initial_population(small_config(), 99).unwrap();
        let mut engine_b = Engine::generate_initial_population(small_config(), 99).unwrap();

        assert_eq!(engine_a.pop.pos_x, engine_b.pop.pos_x);
        assert_eq!(engine_a.pop.dwell_exp, engine_b.pop.dwell_exp);

        for _ in 0..20 {
            engine_a.step_day();
            engine_b.step_day();
            assert_eq!(engine_a.census(), engine_b.census());
        }
        assert_eq!(engine_a.pop.pos_x, engine_b.pop.pos_x);
        assert_eq!(engine_a.pop.pos_y, engine_b.pop.pos_y);
        assert_eq!(engine_a.pop.days_in_state, engine_b.pop.days_in_state);
    }

    #[test]
    fn zero_infection_force_never_exposes() {
        let mut cfg = small_config();
        cfg.model.inf_force = 0.0;
        cfg.init.n_susceptible = 185;
        cfg.init.n_exposed = 0;
        let mut engine = Engine::generate_initial_population(cfg, 21).unwrap();

        for _ in 0..40 {
            engine.step_day();
            assert_eq!(engine.census().n_exp, 0);
        }
    }

    #[test]
    fn tiny_grid_scenario() {
        // N=4 on a 2x2 torus: every cell is in every Moore neighborhood, so
        // the single infectious agent pressures all susceptibles until it
        // transitions out.
        let cfg = Config {
            model: ModelConfig {
                grid_side: 2,
                mean_dwell_exp: 3.0,
                mean_dwell_inf: 7.0,
                mean_dwell_rem: 365.0,
                inf_force: 0.5,
            },
            init: InitConfig {
                n_agents: 4,
                n_susceptible: 3,
                n_exposed: 0,
                n_infectious: 1,
                n_removed: 0,
            },
        };

        let mut engine_a = Engine::generate_initial_population(cfg.clone(), 5).unwrap();
        let mut engine_b = Engine::generate_initial_population(cfg.clone(), 5).unwrap();
        for _ in 0..3 {
            engine_a.step_day();
            engine_b.step_day();
            assert_eq!(engine_a.census(), engine_b.census());
            assert_eq!(engine_a.census().sum(), 4);
        }

        let mut engine_c = Engine::generate_initial_population(cfg, 6).unwrap();
        for _ in 0..3 {
            engine_c.step_day();
            assert_eq!(engine_c.census().sum(), 4);
            assert_eq!(engine_c.grid.total(), engine_c.census().n_inf);
        }
    }
}
