use serde::{Deserialize, Serialize};

/// Epidemiological compartment of a single agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compartment {
    Susceptible,
    Exposed,
    Infectious,
    Removed,
}

/// Per-agent state of the whole population, stored as parallel arrays
/// indexed by agent.
///
/// The dwell durations are drawn once at initialization and keep their
/// values for the agent's entire lifetime, across repeated visits to the
/// same compartment.
pub struct Population {
    pub state_vec: Vec<Compartment>,
    pub pos_x: Vec<u16>,
    pub pos_y: Vec<u16>,
    pub days_in_state: Vec<u32>,
    pub dwell_exp: Vec<f64>,
    pub dwell_inf: Vec<f64>,
    pub dwell_rem: Vec<f64>,
}

impl Population {
    /// Aggregate compartment counts, recomputed by a full scan.
    pub fn census(&self) -> Census {
        let mut census = Census::default();
        for state in &self.state_vec {
            match state {
                Compartment::Susceptible => census.n_sus += 1,
                Compartment::Exposed => census.n_exp += 1,
                Compartment::Infectious => census.n_inf += 1,
                Compartment::Removed => census.n_rem += 1,
            }
        }
        census
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Census {
    pub n_sus: u32,
    pub n_exp: u32,
    pub n_inf: u32,
    pub n_rem: u32,
}

impl Census {
    pub fn sum(&self) -> u32 {
        self.n_sus + self.n_exp + self.n_inf + self.n_rem
    }

    pub fn record(&self, day: u32) -> DayRecord {
        DayRecord {
            t: day,
            s: self.n_sus,
            e: self.n_exp,
            i: self.n_inf,
            r: self.n_rem,
        }
    }
}

/// One row of the trajectory table.
///
/// The renames pin the `t,S,E,I,R` header that downstream consumers match
/// on; the field order is the column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayRecord {
    pub t: u32,
    #[serde(rename = "S")]
    pub s: u32,
    #[serde(rename = "E")]
    pub e: u32,
    #[serde(rename = "I")]
    pub i: u32,
    #[serde(rename = "R")]
    pub r: u32,
}
