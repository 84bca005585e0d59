//! `warbler`: administration tool for a Warbler database.
//!
//! Every subcommand opens the database, runs one unit of work through the
//! account and social services, and prints the result as JSON.

mod config;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use warbler_api::{Accounts, CredentialHasher, Social};
use warbler_db::Database;
use warbler_types::api::{ProfileUpdate, SignupForm};
use warbler_types::models::{Message, User, UserStats};

use crate::config::Config;

#[derive(Parser)]
#[command(name = "warbler")]
#[command(about = "Warbler database administration", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    Migrate,

    /// Register a new user
    Signup {
        username: String,
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        image_url: Option<String>,
    },

    /// Check a username/password pair
    Login {
        username: String,
        #[arg(long)]
        password: String,
    },

    /// Edit a user's profile (requires their current password)
    EditProfile {
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        new_username: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        image_url: Option<String>,
        #[arg(long)]
        header_image_url: Option<String>,
        #[arg(long)]
        bio: Option<String>,
        #[arg(long)]
        location: Option<String>,
    },

    /// FOLLOWER starts following FOLLOWED
    Follow { follower: String, followed: String },

    /// FOLLOWER stops following FOLLOWED
    Unfollow { follower: String, followed: String },

    /// Post a message as AUTHOR
    Post { author: String, text: String },

    /// Like a message, or remove the like if already present
    Like { username: String, message_id: Uuid },

    /// Delete a message written by USERNAME
    DeleteMessage { username: String, message_id: Uuid },

    /// List users, optionally filtered by a username substring
    Users {
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Show a profile with counts, messages, followers, following and likes
    Show { username: String },

    /// Messages by a user and everyone they follow
    Timeline { username: String },

    /// Delete a user and everything that references them
    DeleteUser { username: String },
}

#[derive(Serialize)]
struct Profile {
    user: User,
    stats: UserStats,
    messages: Vec<Message>,
    followers: Vec<User>,
    following: Vec<User>,
    likes: Vec<Message>,
}

fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warbler=info,warbler_db=info,warbler_api=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let db = Database::open(&config.db_path)
        .with_context(|| format!("opening {}", config.db_path.display()))?;
    let accounts = Accounts::new(config.hasher()?);

    run(cli.command, &db, &accounts)
}

fn run<H: CredentialHasher>(command: Commands, db: &Database, accounts: &Accounts<H>) -> Result<()> {
    let social = Social::new(db);
    let mut session = db.session();

    match command {
        Commands::Migrate => {
            info!("Schema is up to date");
        }
        Commands::Signup {
            username,
            email,
            password,
            image_url,
        } => {
            let mut form = SignupForm::new(&username, &email, &password);
            form.image_url = image_url;
            let user = accounts.signup(&mut session, form)?;
            if let Err(e) = session.commit() {
                if e.is_constraint_violation() {
                    bail!("Username or email already taken");
                }
                return Err(e.into());
            }
            info!("Created user {}", user);
            print_json(&user)?;
        }
        Commands::Login { username, password } => {
            let user = accounts
                .authenticate(db, &username, &password)?
                .ok_or_else(|| anyhow!("Invalid credentials."))?;
            print_json(&user)?;
        }
        Commands::EditProfile {
            username,
            password,
            new_username,
            email,
            image_url,
            header_image_url,
            bio,
            location,
        } => {
            let user = find_user(db, &username)?;
            let update = ProfileUpdate {
                username: new_username,
                email,
                image_url,
                header_image_url,
                bio,
                location,
            };
            let updated = accounts
                .update_profile(&mut session, user.id, &password, update)?
                .ok_or_else(|| anyhow!("Invalid password."))?;
            session.commit()?;
            print_json(&updated)?;
        }
        Commands::Follow { follower, followed } => {
            let follower = find_user(db, &follower)?;
            let followed = find_user(db, &followed)?;
            social.follow(&mut session, &follower, followed.id)?;
            session.commit()?;
            print_json(&social.following(&follower)?)?;
        }
        Commands::Unfollow { follower, followed } => {
            let follower = find_user(db, &follower)?;
            let followed = find_user(db, &followed)?;
            social.unfollow(&mut session, &follower, followed.id)?;
            session.commit()?;
            print_json(&social.following(&follower)?)?;
        }
        Commands::Post { author, text } => {
            let author = find_user(db, &author)?;
            let message = social.post_message(&mut session, &author, &text)?;
            session.commit()?;
            print_json(&message)?;
        }
        Commands::Like { username, message_id } => {
            let user = find_user(db, &username)?;
            let liked = social.toggle_like(&mut session, &user, message_id)?;
            session.commit()?;
            print_json(&serde_json::json!({ "message_id": message_id, "liked": liked }))?;
        }
        Commands::DeleteMessage { username, message_id } => {
            let user = find_user(db, &username)?;
            social.delete_message(&mut session, &user, message_id)?;
            session.commit()?;
            info!("Deleted message {}", message_id);
        }
        Commands::Users { search } => {
            print_json(&social.list_users(search.as_deref())?)?;
        }
        Commands::Show { username } => {
            let user = find_user(db, &username)?;
            let profile = Profile {
                stats: social.stats(&user)?,
                messages: social.recent_messages(&user)?,
                followers: social.followers(&user)?,
                following: social.following(&user)?,
                likes: social.likes(&user)?,
                user,
            };
            print_json(&profile)?;
        }
        Commands::Timeline { username } => {
            let user = find_user(db, &username)?;
            print_json(&social.home_timeline(&user)?)?;
        }
        Commands::DeleteUser { username } => {
            let user = find_user(db, &username)?;
            accounts.delete_account(&mut session, user.id)?;
            session.commit()?;
            info!("Deleted user {}", user);
        }
    }

    Ok(())
}

fn find_user(db: &Database, username: &str) -> Result<User> {
    db.get_user_by_username(username)?
        .ok_or_else(|| anyhow!("No such user: {}", username))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
