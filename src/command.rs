use std::str::FromStr;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use ranking::{CatchId, NewCatch, Size, SizeUnit, SpotId, TerritoryId, UserId, Visibility};

#[derive(Debug, Parser)]
#[command(version, about = "Spot titles, territory rulers and leaderboards", long_about = None)]
pub struct Cli {
    /// Print JSON instead of text.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, PartialEq, Subcommand)]
pub enum Command {
    /// Save a catch and let it contend for its spot's title.
    Submit(SubmitArgs),
    /// Let an already saved catch contend for its spot's title again.
    Resubmit { catch: CatchId },
    /// Show the leaderboard of one spot.
    Spot { spot: SpotId, limit: Option<usize> },
    /// Show the leaderboard across all spots.
    Global { limit: Option<usize> },
    /// Show who rules a territory.
    Territory { territory: TerritoryId },
    /// Show the titles and territories a user holds.
    User { user: UserId },
    /// Create a territory.
    AddTerritory { name: String },
    /// Create a spot, optionally inside a territory.
    AddSpot {
        name: String,
        territory: Option<TerritoryId>,
    },
}

#[derive(Debug, PartialEq, Args)]
pub struct SubmitArgs {
    pub owner: UserId,
    /// Spot id, or `-` for a catch made outside any spot.
    pub spot: SpotArg,
    pub species: String,
    #[arg(value_parser = positive_size, allow_negative_numbers = true)]
    pub size: f64,
    /// Length (mm, cm, m, in, ft) or weight unit.
    pub unit: SizeUnit,
    #[arg(default_value = "public")]
    pub visibility: Visibility,
}

impl SubmitArgs {
    pub fn into_catch(self, created_at: DateTime<Utc>) -> NewCatch {
        NewCatch {
            owner: self.owner,
            spot: self.spot.0,
            species: self.species,
            size: Size::new(self.size, self.unit),
            visibility: self.visibility,
            created_at,
        }
    }
}

/// A spot reference where `-` stands for no spot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotArg(pub Option<SpotId>);

impl FromStr for SpotArg {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "-" => Ok(SpotArg(None)),
            id => id.parse().map(|id| SpotArg(Some(id))),
        }
    }
}

fn positive_size(s: &str) -> Result<f64, String> {
    let size: f64 = s.trim().parse().map_err(|err| format!("{err}"))?;
    if size.is_finite() && size > 0.0 {
        Ok(size)
    } else {
        Err("must be a positive number".to_string())
    }
}
