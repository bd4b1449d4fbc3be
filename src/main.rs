#![forbid(unsafe_code)]

mod command;
mod config;

use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use database::SeaOrmStore;
use dotenvy::dotenv;
use log::{debug, info};
use miette::{IntoDiagnostic, Report, Result, WrapErr};
use ranking::{
    leaderboard::{GlobalEntry, SpotLeaderboard},
    resolver::TitleOutcome,
    service::{Kingdom, Submission, UserSummary},
    store::{LogSink, NotificationSink, TitleChanged},
    territory::TerritoryStanding,
    Catch,
};
use serde::Serialize;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{
    command::{Cli, Command},
    config::Config,
};

#[derive(Debug, Serialize)]
struct SubmissionReport<'a> {
    catch: &'a Catch,
    title: Option<&'a TitleOutcome>,
    error: Option<String>,
    territory: Option<&'a TerritoryStanding>,
}

impl<'a> From<&'a Submission> for SubmissionReport<'a> {
    fn from(submission: &'a Submission) -> Self {
        Self {
            catch: &submission.catch,
            title: submission.title.as_ref().ok(),
            error: submission.title.as_ref().err().map(ToString::to_string),
            territory: submission.territory.as_ref(),
        }
    }
}

#[derive(Debug, Serialize)]
struct Created {
    kind: &'static str,
    id: i32,
}

#[tokio::main]
async fn main() -> Result<()> {
    pretty_env_logger::init_timed();
    dotenv().ok();

    run().await.wrap_err("failed to run catch-kings")
}

async fn run() -> Result<()> {
    let Cli { command, json } = Cli::parse();
    let config = Config::from_env()?;

    let db = database::connection(&config.database_url).await?;
    database::migrate(&db).await?;
    let store = Arc::new(SeaOrmStore::new(db));

    let (tx, rx) = mpsc::unbounded_channel();
    let announcer = announce(rx, !json);
    let kingdom = Kingdom::new(store.clone(), config.resolver.clone()).with_notifications(tx);

    let result = execute(&kingdom, &store, &config, command, json).await;

    // closes the channel so the announcer can drain and stop
    drop(kingdom);
    announcer.await.into_diagnostic()?;

    result
}

fn announce(mut rx: mpsc::UnboundedReceiver<TitleChanged>, print: bool) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if print {
                match event.previous_king {
                    Some(previous) => println!(
                        "user {} took spot {} from user {previous}",
                        event.king, event.spot
                    ),
                    None => println!("user {} is the first king of spot {}", event.king, event.spot),
                }
            }
            LogSink.notify(event);
        }
        debug!("Announcer stopped");
    })
}

async fn execute(
    kingdom: &Kingdom<SeaOrmStore>,
    store: &SeaOrmStore,
    config: &Config,
    command: Command,
    json: bool,
) -> Result<()> {
    match command {
        Command::Submit(args) => {
            let submission = kingdom.submit(args.into_catch(Utc::now())).await?;
            report_submission(submission, json)
        }
        Command::Resubmit { catch } => {
            let submission = kingdom.resubmit(catch).await?;
            report_submission(submission, json)
        }
        Command::Spot { spot, limit } => {
            let board = kingdom
                .spot_leaderboard(spot, limit.unwrap_or(config.leaderboard_limit))
                .await?;
            if json {
                print_json(&board)
            } else {
                print_spot_board(&board);
                Ok(())
            }
        }
        Command::Global { limit } => {
            let board = kingdom
                .global_leaderboard(limit.unwrap_or(config.leaderboard_limit))
                .await?;
            if json {
                print_json(&board)
            } else {
                print_global_board(&board);
                Ok(())
            }
        }
        Command::Territory { territory } => {
            let standing = kingdom.territory_standing(territory).await?;
            if json {
                print_json(&standing)
            } else {
                print_standing(&standing);
                Ok(())
            }
        }
        Command::User { user } => {
            let summary = kingdom.user_summary(user).await?;
            if json {
                print_json(&summary)
            } else {
                print_summary(&summary);
                Ok(())
            }
        }
        Command::AddTerritory { name } => {
            let id = store
                .create_territory(&name)
                .await
                .wrap_err("Could not create territory")?;
            info!("Created territory {id} ({name})");
            report_created("territory", id.0, json)
        }
        Command::AddSpot { name, territory } => {
            let id = store
                .create_spot(&name, territory)
                .await
                .wrap_err("Could not create spot")?;
            info!("Created spot {id} ({name})");
            report_created("spot", id.0, json)
        }
    }
}

fn report_submission(submission: Submission, json: bool) -> Result<()> {
    if json {
        print_json(&SubmissionReport::from(&submission))?;
    } else {
        println!("saved catch {}: {}", submission.catch.id, submission.catch);
        match &submission.title {
            Ok(TitleOutcome::NotQualified) => println!("private catches do not compete for titles"),
            Ok(TitleOutcome::NoSpot) => println!("no spot given, nothing to claim"),
            Ok(TitleOutcome::Kept { king: Some(king) }) => {
                println!("the record of user {king} stands")
            }
            Ok(TitleOutcome::Kept { king: None }) => println!("the spot stays untitled"),
            Ok(TitleOutcome::Claimed(change)) => println!(
                "user {} now holds spot {} with {} ({})",
                change.king, change.spot, change.title.best_size, change.version
            ),
            Err(_) => {}
        }
        if let Some(standing) = &submission.territory {
            print_standing(standing);
        }
    }

    // the catch is saved either way, only the title step failed
    match submission.title {
        Ok(_) => Ok(()),
        Err(err) => Err(Report::new(err)),
    }
}

fn report_created(kind: &'static str, id: i32, json: bool) -> Result<()> {
    if json {
        print_json(&Created { kind, id })
    } else {
        println!("created {kind} {id}");
        Ok(())
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .into_diagnostic()
        .wrap_err("Could not serialize output")?;
    println!("{json}");
    Ok(())
}

fn print_spot_board(board: &SpotLeaderboard) {
    match board.king {
        Some(king) => println!("spot {} (king: user {king})", board.spot),
        None => println!("spot {} (untitled)", board.spot),
    }
    for entry in &board.entries {
        println!(
            "{:>3}. user {:<6} {:<16} {:>10} {}",
            entry.rank,
            entry.user,
            entry.species,
            entry.size.to_string(),
            if entry.is_king { "👑" } else { "" }
        );
    }
}

fn print_global_board(board: &[GlobalEntry]) {
    for entry in board {
        println!(
            "{:>3}. user {:<6} {:>3} crowns {:>10.1} total {:>3} territories",
            entry.rank, entry.user, entry.crowns, entry.total_size, entry.territories_ruled
        );
    }
}

fn print_standing(standing: &TerritoryStanding) {
    match standing.ruler {
        Some(ruler) => println!("territory {} is ruled by user {ruler}", standing.territory),
        None => println!("territory {} has no ruler", standing.territory),
    }
    for tally in &standing.ranking {
        println!(
            "     user {:<6} {:>3} crowns {:>10.1} total",
            tally.user, tally.crowns, tally.total_size
        );
    }
}

fn print_summary(summary: &UserSummary) {
    println!("user {}: {} catches", summary.user, summary.catches);
    if let Some(best) = &summary.best_catch {
        println!("best catch: {best}");
    }
    println!("spots held: {}", join(&summary.spots));
    println!("territories ruled: {}", join(&summary.territories));
}

fn join<T: ToString>(ids: &[T]) -> String {
    if ids.is_empty() {
        return "none".to_string();
    }
    ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}
