use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;

use cinema_recs::{
    config::Config,
    logging,
    models::{Registration, RecommendationRequest, Subject},
    services::{
        strategy, AccountService, CatalogClient, ComparisonEngine, HttpTransport, Orchestrator,
        Transport,
    },
    session::SessionStore,
    tracking::SubjectTracker,
};

/// Command-line client for the movie recommendation service
#[derive(Parser, Debug)]
#[command(name = "cinema-recs")]
#[command(about = "Fetch and compare movie recommendations")]
#[command(version)]
struct Args {
    /// Overrides CINEMA_API_URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

/// Subject flags shared by the recommendation commands
#[derive(clap::Args, Debug)]
struct SubjectArgs {
    /// User to recommend for. Defaults to the signed-in user.
    #[arg(short, long)]
    user: Option<i64>,

    /// Reference movie for content, item and hybrid strategies
    #[arg(short, long)]
    movie: Option<i64>,

    #[arg(short = 'n', long)]
    limit: Option<u32>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the available strategies
    Strategies,
    /// Run one strategy
    Recommend {
        strategy: String,
        #[command(flatten)]
        subject: SubjectArgs,
        /// Extra query parameter, repeatable
        #[arg(long = "param", value_parser = parse_key_val)]
        params: Vec<(String, String)>,
    },
    /// Run several strategies side by side
    Compare {
        /// Comma-separated strategy names. Defaults to all of them.
        #[arg(short, long, value_delimiter = ',')]
        strategies: Vec<String>,
        #[command(flatten)]
        subject: SubjectArgs,
    },
    /// Let the service compare its methods in one call
    CompareRemote {
        #[command(flatten)]
        subject: SubjectArgs,
    },
    Search {
        query: String,
        #[arg(short = 'n', long)]
        limit: Option<u32>,
    },
    Movie {
        movie_id: i64,
    },
    Genre {
        genre: String,
        #[arg(short = 'n', long)]
        limit: Option<u32>,
    },
    SimilarUsers {
        #[arg(short, long)]
        user: Option<i64>,
        #[arg(short = 'n', long)]
        limit: Option<u32>,
    },
    Ratings {
        #[arg(short, long)]
        user: Option<i64>,
    },
    Profile {
        #[arg(short, long)]
        user: Option<i64>,
    },
    /// Rate a movie as the signed-in user
    Rate {
        movie_id: i64,
        rating: f64,
    },
    /// Tag a movie as the signed-in user
    Tag {
        movie_id: i64,
        tag: String,
    },
    Login {
        username: String,
        #[arg(long, env = "CINEMA_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Register {
        username: String,
        #[arg(long, env = "CINEMA_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        firstname: Option<String>,
        #[arg(long)]
        lastname: Option<String>,
    },
    Logout,
    Whoami,
}

fn parse_key_val(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected KEY=VALUE, got `{}`", raw))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

struct App {
    config: Config,
    session: Arc<SessionStore>,
    orchestrator: Orchestrator,
    catalog: CatalogClient,
    accounts: AccountService,
}

impl App {
    fn new(config: Config) -> Result<Self> {
        let transport: Arc<dyn Transport> = Arc::new(
            HttpTransport::from_config(&config).context("Failed to build HTTP client")?,
        );
        let session =
            Arc::new(SessionStore::from_config(&config).context("Failed to open session store")?);

        Ok(Self {
            orchestrator: Orchestrator::new(transport.clone()),
            catalog: CatalogClient::new(transport.clone()),
            accounts: AccountService::new(transport, session.clone()),
            session,
            config,
        })
    }

    fn limit(&self, requested: Option<u32>) -> u32 {
        requested.unwrap_or(self.config.default_limit)
    }

    /// Explicit user id, else the signed-in one
    fn user_id(&self, explicit: Option<i64>) -> Result<Option<i64>> {
        match explicit {
            Some(id) => Ok(Some(id)),
            None => Ok(self.session.user_id()?),
        }
    }

    fn require_user(&self, explicit: Option<i64>) -> Result<i64> {
        self.user_id(explicit)?
            .context("No user given and nobody is signed in; run `login` or pass --user")
    }

    fn subject(&self, args: &SubjectArgs) -> Result<Subject> {
        Ok(Subject {
            user_id: self.user_id(args.user)?,
            movie_id: args.movie,
        })
    }

    async fn run(&self, command: Command) -> Result<()> {
        match command {
            Command::Strategies => {
                let listing: Vec<_> = strategy::all()
                    .iter()
                    .map(|s| {
                        json!({
                            "name": s.name,
                            "requiresAuth": s.requires_auth,
                            "requiresSubjectItem": s.requires_subject_item,
                            "description": s.description,
                        })
                    })
                    .collect();
                print_json(&listing)
            }
            Command::Recommend {
                strategy,
                subject,
                params,
            } => {
                let subject_value = self.subject(&subject)?;
                let tracker = SubjectTracker::new(subject_value);
                let request = params.into_iter().fold(
                    RecommendationRequest::new(strategy)
                        .with_subject(subject_value)
                        .with_limit(self.limit(subject.limit)),
                    |request, (key, value)| request.with_param(key, value),
                );

                let result = self.orchestrator.recommend(request).await?;
                match tracker.accept(result) {
                    Some(result) => print_json(&result),
                    None => Ok(()),
                }
            }
            Command::Compare {
                strategies,
                subject,
            } => {
                let engine = ComparisonEngine::new(self.orchestrator.clone());
                let subject_value = self.subject(&subject)?;
                let limit = self.limit(subject.limit);

                let result = if strategies.is_empty() {
                    engine.compare_all(subject_value, limit).await
                } else {
                    engine.compare(strategies, subject_value, limit).await
                };
                print_json(&result.to_json())
            }
            Command::CompareRemote { subject } => {
                let engine = ComparisonEngine::new(self.orchestrator.clone());
                let comparison = engine
                    .compare_remote(self.subject(&subject)?, self.limit(subject.limit))
                    .await?;
                print_json(&comparison)
            }
            Command::Search { query, limit } => {
                print_json(&self.catalog.search_movies(&query, self.limit(limit)).await?)
            }
            Command::Movie { movie_id } => print_json(&self.catalog.movie_by_id(movie_id).await?),
            Command::Genre { genre, limit } => {
                print_json(&self.catalog.movies_by_genre(&genre, self.limit(limit)).await?)
            }
            Command::SimilarUsers { user, limit } => {
                let user_id = self.require_user(user)?;
                print_json(&self.catalog.similar_users(user_id, self.limit(limit)).await?)
            }
            Command::Ratings { user } => {
                let user_id = self.require_user(user)?;
                print_json(&self.catalog.user_ratings(user_id).await?)
            }
            Command::Profile { user } => {
                let user_id = self.require_user(user)?;
                print_json(&self.accounts.profile(user_id).await?)
            }
            Command::Rate { movie_id, rating } => {
                let user_id = self.require_user(None)?;
                let message = self.catalog.rate_movie(user_id, movie_id, rating).await?;
                print_json(&json!({ "message": message }))
            }
            Command::Tag { movie_id, tag } => {
                let user_id = self.require_user(None)?;
                let message = self.catalog.add_tag(user_id, movie_id, &tag).await?;
                print_json(&json!({ "message": message }))
            }
            Command::Login { username, password } => {
                print_json(&self.accounts.login(&username, &password).await?)
            }
            Command::Register {
                username,
                password,
                firstname,
                lastname,
            } => {
                let identity = self
                    .accounts
                    .register(Registration {
                        username,
                        password,
                        firstname,
                        lastname,
                    })
                    .await?;
                print_json(&identity)
            }
            Command::Logout => {
                self.accounts.logout()?;
                print_json(&json!({ "signedIn": false }))
            }
            Command::Whoami => print_json(&self.accounts.current()?),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::from_env()?;
    if let Some(api_url) = args.api_url {
        config.api_url = api_url;
        config.validate()?;
    }

    logging::init(&config);
    tracing::debug!(api_url = %config.api_url, "Starting cinema-recs");

    App::new(config)?.run(args.command).await
}
