use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use serde_json::{json, Value};

/// Command-line client for the reviewer assignment service
#[derive(Parser, Debug)]
#[command(name = "reviewer")]
#[command(about = "Manage teams and pull request reviewers", long_about = None)]
struct Cli {
    /// Base URL of the reviewer service
    #[arg(
        long,
        global = true,
        env = "REVIEWER_SERVER_URL",
        default_value = "http://localhost:8080"
    )]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage teams
    #[command(subcommand)]
    Team(TeamCommand),
    /// Manage users
    #[command(subcommand)]
    User(UserCommand),
    /// Manage pull requests
    #[command(subcommand)]
    Pr(PrCommand),
    /// Show pull request statistics
    Stats,
}

#[derive(Subcommand, Debug)]
enum TeamCommand {
    /// Create a team or add new members to an existing one
    Add {
        team_name: String,
        /// Member as `user_id:username`, or `user_id:username:inactive`
        #[arg(long = "member", required = true, value_parser = parse_member)]
        members: Vec<Member>,
    },
    /// Show a team and its members
    Get { team_name: String },
    /// Mark every member of a team inactive
    Deactivate { team_name: String },
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    /// Set whether a user can be assigned reviews
    SetActive {
        user_id: String,
        #[arg(action = ArgAction::Set)]
        active: bool,
    },
    /// List pull requests a user is reviewing
    Reviews { user_id: String },
}

#[derive(Subcommand, Debug)]
enum PrCommand {
    /// Open a pull request and assign reviewers
    Create {
        pull_request_id: String,
        pull_request_name: String,
        #[arg(long)]
        author: String,
    },
    /// Merge a pull request
    Merge { pull_request_id: String },
    /// Replace a reviewer on an open pull request
    Reassign {
        pull_request_id: String,
        #[arg(long)]
        old_reviewer: String,
    },
    /// Show a pull request
    Get { pull_request_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Member {
    user_id: String,
    username: String,
    is_active: bool,
}

fn parse_member(s: &str) -> Result<Member, String> {
    let mut parts = s.splitn(3, ':');
    let user_id = parts.next().unwrap_or_default().trim();
    let username = parts.next().unwrap_or_default().trim();
    if user_id.is_empty() || username.is_empty() {
        return Err(format!("expected user_id:username, got '{}'", s));
    }
    let is_active = match parts.next().map(str::trim) {
        None | Some("active") => true,
        Some("inactive") => false,
        Some(other) => {
            return Err(format!(
                "member state must be 'active' or 'inactive', got '{}'",
                other
            ))
        }
    };
    Ok(Member {
        user_id: user_id.to_string(),
        username: username.to_string(),
        is_active,
    })
}

struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    fn new(base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        let response = self
            .http
            .get(self.url(path))
            .query(query)
            .send()
            .await
            .with_context(|| format!("GET {} failed", path))?;
        read_response(response).await
    }

    async fn post(&self, path: &str, query: &[(&str, &str)], body: Option<Value>) -> Result<Value> {
        let mut request = self.http.post(self.url(path)).query(query);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("POST {} failed", path))?;
        read_response(response).await
    }
}

/// Return the JSON body, or turn an error body into a readable error.
async fn read_response(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let body: Value = response
        .json()
        .await
        .with_context(|| format!("Response with status {} was not JSON", status))?;

    if status.is_success() {
        return Ok(body);
    }

    let code = body["error"]["code"].as_str().unwrap_or("UNKNOWN");
    let message = body["error"]["message"].as_str().unwrap_or("no message");
    Err(anyhow!("{} {}: {}", status.as_u16(), code, message))
}

async fn run(client: &ApiClient, command: Commands) -> Result<Value> {
    match command {
        Commands::Team(TeamCommand::Add { team_name, members }) => {
            let members: Vec<Value> = members
                .into_iter()
                .map(|m| {
                    json!({
                        "user_id": m.user_id,
                        "username": m.username,
                        "is_active": m.is_active
                    })
                })
                .collect();
            client
                .post(
                    "/team/add",
                    &[],
                    Some(json!({ "team_name": team_name, "members": members })),
                )
                .await
        }
        Commands::Team(TeamCommand::Get { team_name }) => {
            client.get("/team/get", &[("team_name", &team_name)]).await
        }
        Commands::Team(TeamCommand::Deactivate { team_name }) => {
            client
                .post("/team/deactivate", &[("team_name", &team_name)], None)
                .await
        }
        Commands::User(UserCommand::SetActive { user_id, active }) => {
            client
                .post(
                    "/users/setIsActive",
                    &[],
                    Some(json!({ "user_id": user_id, "is_active": active })),
                )
                .await
        }
        Commands::User(UserCommand::Reviews { user_id }) => {
            client
                .get("/users/getReview", &[("user_id", &user_id)])
                .await
        }
        Commands::Pr(PrCommand::Create {
            pull_request_id,
            pull_request_name,
            author,
        }) => {
            client
                .post(
                    "/pullRequest/create",
                    &[],
                    Some(json!({
                        "pull_request_id": pull_request_id,
                        "pull_request_name": pull_request_name,
                        "author_id": author
                    })),
                )
                .await
        }
        Commands::Pr(PrCommand::Merge { pull_request_id }) => {
            client
                .post(
                    "/pullRequest/merge",
                    &[],
                    Some(json!({ "pull_request_id": pull_request_id })),
                )
                .await
        }
        Commands::Pr(PrCommand::Reassign {
            pull_request_id,
            old_reviewer,
        }) => {
            client
                .post(
                    "/pullRequest/reassign",
                    &[],
                    Some(json!({
                        "pull_request_id": pull_request_id,
                        "old_reviewer_id": old_reviewer
                    })),
                )
                .await
        }
        Commands::Pr(PrCommand::Get { pull_request_id }) => {
            client
                .get("/pullRequest/get", &[("pull_request_id", &pull_request_id)])
                .await
        }
        Commands::Stats => client.get("/stats", &[]).await,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = ApiClient::new(&cli.server)?;

    let body = run(&client, cli.command).await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&body).context("Failed to format response")?
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_member() {
        assert_eq!(
            parse_member("u1:alice").unwrap(),
            Member {
                user_id: "u1".to_string(),
                username: "alice".to_string(),
                is_active: true,
            }
        );
        assert!(!parse_member("u2:bob:inactive").unwrap().is_active);
        assert!(parse_member("u3").is_err());
        assert!(parse_member(":alice").is_err());
        assert!(parse_member("u4:dan:asleep").is_err());
    }

    #[test]
    fn test_parse_team_add() {
        let cli = Cli::try_parse_from([
            "reviewer",
            "team",
            "add",
            "qa",
            "--member",
            "u1:alice",
            "--member",
            "u2:bob:inactive",
        ])
        .unwrap();
        match cli.command {
            Commands::Team(TeamCommand::Add { team_name, members }) => {
                assert_eq!(team_name, "qa");
                assert_eq!(members.len(), 2);
                assert!(!members[1].is_active);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_set_active_and_server() {
        let cli = Cli::try_parse_from([
            "reviewer",
            "--server",
            "http://reviewer:9000/",
            "user",
            "set-active",
            "u1",
            "false",
        ])
        .unwrap();
        assert_eq!(cli.server, "http://reviewer:9000/");
        assert!(matches!(
            cli.command,
            Commands::User(UserCommand::SetActive { active: false, .. })
        ));

        let client = ApiClient::new(&cli.server).unwrap();
        assert_eq!(client.url("/stats"), "http://reviewer:9000/stats");
    }
}
