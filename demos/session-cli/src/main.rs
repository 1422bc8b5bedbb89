use chatline::prelude::*;

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

const USAGE: &str = "\
usage: session-cli <command>

commands:
  resume                                   restore the saved session
  watch                                    restore the session and print who's online
  login <email> <password>                 log into an existing account
  signup <email> <password> <name> <bio>   create an account
  profile <bio>                            change your bio
  logout                                   end the session

environment:
  CHATLINE_BACKEND_URL (required), CHATLINE_STORAGE_DIR, CHATLINE_REALTIME_PATH, RUST_LOG";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Resume,
    Watch,
    Login { email: String, password: String },
    SignUp { email: String, password: String, full_name: String, bio: String },
    Profile { bio: String },
    Logout,
}

fn parse(args: &[String]) -> Option<Command> {
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    let command = match args.as_slice() {
        ["resume"] => Command::Resume,
        ["watch"] => Command::Watch,
        ["login", email, password] => Command::Login {
            email: email.to_string(),
            password: password.to_string(),
        },
        ["signup", email, password, full_name, bio] => Command::SignUp {
            email: email.to_string(),
            password: password.to_string(),
            full_name: full_name.to_string(),
            bio: bio.to_string(),
        },
        ["profile", bio] => Command::Profile { bio: bio.to_string() },
        ["logout"] => Command::Logout,
        _ => return None,
    };
    Some(command)
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn describe(identity: &Identity) -> String {
    match &identity.full_name {
        Some(name) => format!("{name} ({})", identity.id),
        None => identity.id.to_string(),
    }
}

async fn watch_presence(client: &ChatlineClient) -> Result<(), ChatlineError> {
    let mut channel = client.subscribe_channel();
    loop {
        {
            let snapshot = channel.borrow_and_update();
            let online: Vec<String> = snapshot.presence.iter().map(UserId::to_string).collect();
            println!("[{:?}] online: {}", snapshot.state, online.join(", "));
        }
        tokio::select! {
            changed = channel.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
            }
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}

async fn run(client: &ChatlineClient, command: Command) -> Result<(), ChatlineError> {
    match command {
        Command::Resume => match client.resume_session().await? {
            Some(identity) => println!("logged in as {}", describe(&identity)),
            None => println!("not logged in"),
        },
        Command::Watch => {
            if client.resume_session().await?.is_none() {
                println!("not logged in");
                return Ok(());
            }
            watch_presence(client).await?;
        }
        Command::Login { email, password } => {
            let identity = client
                .login(AuthMode::Login, &AuthRequest::login(email, password))
                .await?;
            println!("logged in as {}", describe(&identity));
        }
        Command::SignUp { email, password, full_name, bio } => {
            let request = AuthRequest::sign_up(email, password, full_name, bio);
            let identity = client.login(AuthMode::SignUp, &request).await?;
            println!("signed up as {}", describe(&identity));
        }
        Command::Profile { bio } => {
            if client.resume_session().await?.is_none() {
                println!("not logged in");
                return Ok(());
            }
            let update = ProfileUpdate { bio: Some(bio), ..ProfileUpdate::default() };
            let identity = client.update_profile(&update).await?;
            println!("profile updated for {}", describe(&identity));
        }
        Command::Logout => client.logout().await?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    chatline::init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = parse(&args) else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };

    let client = ChatlineClient::builder()
        .config(ClientConfig::from_env())
        .build()?;

    let result = run(&client, command).await;
    client.shutdown().await?;
    if let Err(e) = result {
        // Losing to a concurrent operation isn't worth reporting.
        if e.is_user_facing() {
            eprintln!("error: {e}");
        }
        std::process::exit(1);
    }
    Ok(())
}
