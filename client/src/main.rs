use anyhow::{Context, Result, anyhow};
use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use devconnect::backend::PgBackend;
use devconnect::db::DatabaseConfig;
use devconnect::models::Profile;
use devconnect::services::{AuthClient, StorageClient};
use devconnect::views::{
    ChatView, DiscoverView, ImageUpload, NetworkView, OwnProfileView, PeerProfileView, ProfileSetup,
    auth,
};
use devconnect::{Config, Session, Uuid, get_db_pool, utils};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Developer networking client")]
struct Cli {
    #[arg(long, global = true, env = "DEVCONNECT_EMAIL")]
    email: Option<String>,

    #[arg(long, global = true, env = "DEVCONNECT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an account
    Signup {
        #[arg(long)]
        name: String,
    },
    /// Create the profile after signing up
    Setup {
        #[arg(long, default_value = "")]
        bio: String,
        /// Comma-separated
        #[arg(long, default_value = "")]
        skills: String,
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Show the signed-in account's profile
    Profile,
    /// Change profile fields; omitted fields keep their value
    EditProfile {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        new_email: Option<String>,
        #[arg(long)]
        bio: Option<String>,
        #[arg(long)]
        skills: Option<String>,
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// List developers to connect with
    Discover {
        #[arg(long, default_value = "")]
        search: String,
    },
    /// Show another developer's profile
    View { user_id: Uuid },
    /// Send a connection request
    Connect { user_id: Uuid },
    /// Withdraw a sent request
    Cancel { user_id: Uuid },
    /// Received requests and accepted connections
    Connections {
        #[arg(long, default_value = "")]
        search: String,
    },
    Accept { connection_id: Uuid },
    Reject { connection_id: Uuid },
    /// Chat over an accepted connection
    Chat { connection_id: Uuid },
}

struct Clients {
    api: PgBackend,
    auth: AuthClient,
    storage: StorageClient,
    tz: Tz,
}

#[tokio::main]
async fn main() -> Result<()> {
    utils::init_logging();
    let cli = Cli::parse();

    let config = Config::from_env()?;
    let db_config = DatabaseConfig::from_env()?;
    let pool = get_db_pool(&db_config).await?;

    let clients = Clients {
        api: PgBackend::new(pool),
        auth: AuthClient::new(&config.api_url, config.api_key.clone()),
        storage: StorageClient::new(
            &config.api_url,
            config.api_key.clone(),
            config.profile_image_bucket.clone(),
        ),
        tz: config.display_tz,
    };

    let (email, password) = match (cli.email, cli.password) {
        (Some(email), Some(password)) => (email, password),
        _ => {
            return Err(anyhow!(
                "--email and --password (or DEVCONNECT_EMAIL and DEVCONNECT_PASSWORD) are required"
            ));
        }
    };

    if let Command::Signup { name } = &cli.command {
        let session = auth::sign_up(&clients.auth, &email, &password, name).await?;
        println!("Account created for {}", session.account.email);
        println!("Run `devconnect setup` to create your profile.");
        return Ok(());
    }

    let session = auth::sign_in(&clients.auth, &email, &password).await?;
    let result = run(&clients, &session, cli.command).await;
    auth::sign_out(&clients.auth, session).await?;
    result
}

async fn run(clients: &Clients, session: &Session, command: Command) -> Result<()> {
    let api = &clients.api;

    match command {
        Command::Signup { .. } => return Err(anyhow!("Already signed up as {}", session.account.email)),
        Command::Setup { bio, skills, image } => {
            let image = load_image(image).await?;
            let profile = ProfileSetup { bio, skills, image }
                .submit(api, &clients.storage, session)
                .await?;
            println!("Profile created.");
            print_profile(&profile);
        }
        Command::Profile => {
            let view = OwnProfileView::load(api, session).await;
            let profile = view.profile().context("No profile yet; run `devconnect setup`")?;
            print_profile(profile);
            println!("  email: {}", view.email());
        }
        Command::EditProfile {
            name,
            new_email,
            bio,
            skills,
            image,
        } => {
            let mut view = OwnProfileView::load(api, session).await;
            let mut form = view.form().context("Could not load your profile")?;
            if let Some(name) = name {
                form.full_name = name;
            }
            if let Some(email) = new_email {
                form.email = email;
            }
            if let Some(bio) = bio {
                form.bio = bio;
            }
            if let Some(skills) = skills {
                form.skills = skills;
            }
            form.image = load_image(image).await?;

            let outcome = view.save(&clients.storage, &clients.auth, form).await?;
            println!("Profile updated.");
            if outcome.email_change_requested {
                println!("A confirmation email was sent to the new address.");
            }
            print_profile(&outcome.profile);
        }
        Command::Discover { search } => {
            let view = DiscoverView::load(api, session).await;
            if view.load_failed() {
                println!("Could not load developers.");
            }
            let candidates = view.candidates(&search);
            if candidates.is_empty() {
                println!("No developers found.");
            }
            for candidate in candidates {
                println!(
                    "{}  {}  [{}]  {}",
                    candidate.profile.user_id,
                    candidate.profile.full_name,
                    skill_summary(candidate.profile),
                    candidate.state
                );
            }
        }
        Command::View { user_id } => {
            let view = PeerProfileView::load(api, session, user_id).await?;
            match view.profile() {
                Some(profile) => print_profile(profile),
                None => println!("Profile not found."),
            }
            println!("  status: {}", view.state());
            if let Some(target) = view.chat_target() {
                println!("  chat: devconnect chat {}", target.connection_id);
            }
        }
        Command::Connect { user_id } => {
            let mut view = DiscoverView::load(api, session).await;
            let state = view.request(user_id).await?;
            println!("Request sent ({}).", state);
        }
        Command::Cancel { user_id } => {
            let mut view = DiscoverView::load(api, session).await;
            let state = view.cancel(user_id).await?;
            println!("Request withdrawn ({}).", state);
        }
        Command::Connections { search } => {
            let view = NetworkView::load(api, session).await;
            if view.load_failed() {
                println!("Could not load connections.");
            }

            println!("Pending requests:");
            for request in view.pending(&search) {
                let name = request
                    .requester
                    .as_ref()
                    .map_or("Unknown", |profile| profile.full_name.as_str());
                println!("  {}  from {}", request.connection.id, name);
            }

            println!("{}:", view.summary());
            for contact in view.contacts(&search) {
                match &contact.profile {
                    Some(profile) => println!(
                        "  {}  {}  [{}]",
                        contact.connection.id,
                        profile.full_name,
                        skill_summary(profile)
                    ),
                    None => println!("  {}  Unknown", contact.connection.id),
                }
            }
        }
        Command::Accept { connection_id } => {
            let mut view = NetworkView::load(api, session).await;
            view.accept(connection_id).await?;
            println!("Connection accepted. Chat with `devconnect chat {}`.", connection_id);
        }
        Command::Reject { connection_id } => {
            let mut view = NetworkView::load(api, session).await;
            view.reject(connection_id).await?;
            println!("Request rejected.");
        }
        Command::Chat { connection_id } => {
            let network = NetworkView::load(api, session).await;
            let target = network
                .chat_target(connection_id)
                .context("Not an accepted connection")?;
            let mut chat = ChatView::open(api, session, target.connection_id, target.peer_id).await;
            run_chat(&mut chat, clients.tz).await?;
        }
    }

    Ok(())
}

/// Reads lines from stdin and sends them while printing rows pushed by the feed.
async fn run_chat(chat: &mut ChatView<'_, PgBackend>, tz: Tz) -> Result<()> {
    let peer_name = chat
        .peer()
        .map_or_else(|| "Unknown".to_string(), |profile| profile.full_name.clone());
    if chat.load_failed() {
        println!("Could not load earlier messages.");
    }
    println!("Chatting with {}. Empty line or Ctrl-D to leave.", peer_name);

    print_new(chat, tz, &peer_name);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut listening = chat.is_live();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    break;
                }
                chat.set_compose(line);
                if let Err(e) = chat.send().await {
                    println!("Message not sent: {}", e);
                }
            }
            pushed = chat.next_pushed(), if listening => {
                if pushed.is_none() {
                    info!("Message feed closed");
                    listening = false;
                }
            }
        }
        print_new(chat, tz, &peer_name);
    }

    chat.close();
    Ok(())
}

fn print_new(chat: &mut ChatView<'_, PgBackend>, tz: Tz, peer_name: &str) {
    for line in chat.take_unseen(tz) {
        let who = if line.own { "You" } else { peer_name };
        println!("[{}] {}: {}", line.time, who, line.content);
    }
}

async fn load_image(path: Option<PathBuf>) -> Result<Option<ImageUpload>> {
    match path {
        Some(path) => {
            let image = ImageUpload::from_path(&path)
                .await
                .with_context(|| format!("Could not read {}", path.display()))?;
            Ok(Some(image))
        }
        None => Ok(None),
    }
}

fn skill_summary(profile: &Profile) -> String {
    let (shown, more) = profile.skill_preview();
    let mut summary = shown.join(", ");
    if more > 0 {
        summary.push_str(&format!(" +{} more", more));
    }
    summary
}

fn print_profile(profile: &Profile) {
    println!("{}", profile.full_name);
    if let Some(bio) = &profile.bio {
        println!("  {}", bio);
    }
    if !profile.skills.is_empty() {
        println!("  skills: {}", profile.skills.join(", "));
    }
    if let Some(url) = &profile.profile_image_url {
        println!("  image: {}", url);
    }
}
