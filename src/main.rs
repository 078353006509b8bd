#![recursion_limit = "256"]
mod adm;
mod dbopt;
mod geocode;
mod models;
mod schema;
mod server;
mod store;
mod uploads;

use crate::adm::result::Error;
use crate::adm::{seed, users};
use crate::dbopt::DbOpt;
use crate::store::pg::PgRepo;
use crate::store::SessionStore;
use clap::Parser;
use dotenv::dotenv;
use std::process::exit;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Command line interface for rcamp, a campground directory.
#[derive(Parser)]
#[clap(about, version)]
enum RCamp {
    /// Run the rcamp web server.
    Runserver(server::Args),
    /// Replace all campgrounds with generated ones.
    Seed(seed::Args),
    /// List existing users.
    Userlist {
        #[clap(flatten)]
        db: DbOpt,
    },
    /// Set password for a (new or existing) user.
    Userpass {
        #[clap(flatten)]
        db: DbOpt,
        /// Email address, needed when creating a new user.
        #[clap(long)]
        email: Option<String>,
        /// Username to set password for.
        user: String,
    },
    /// Remove expired sessions from the database.
    ExpireSessions {
        #[clap(flatten)]
        db: DbOpt,
    },
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    match run(&RCamp::parse()).await {
        Ok(()) => (),
        Err(err) => {
            println!("{err}");
            exit(1);
        }
    }
}

async fn run(args: &RCamp) -> Result<(), Error> {
    match args {
        RCamp::Runserver(args) => server::run(args).await,
        RCamp::Seed(args) => seed::run(args).await,
        RCamp::Userlist { db } => users::list(&repo(db)?).await,
        RCamp::Userpass { db, email, user } => {
            users::passwd(&repo(db)?, user, email.as_deref()).await
        }
        RCamp::ExpireSessions { db } => {
            let n = repo(db)?.purge_expired().await?;
            info!("Removed {} expired sessions", n);
            Ok(())
        }
    }
}

fn repo(db: &DbOpt) -> Result<PgRepo, Error> {
    Ok(PgRepo::new(db.create_pool()?))
}

include!(concat!(env!("OUT_DIR"), "/templates.rs"));
