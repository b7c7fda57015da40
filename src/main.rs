use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use jobq::config::Config;
use jobq::queue::types::{Job, NewComment, Project};
use jobq::queue::{update_project, Auth, CachedQueueClient, FormSubmission, QueueClient};
use serde_json::{Map, Value};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "jobq")]
#[command(about = "Browse and manage jobs on the neuromorphic job queue")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/jobq/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Collaboration to work in
  #[arg(short = 'C', long)]
  collab: Option<String>,

  /// Override the server URL from the config file
  #[arg(long)]
  url: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List collaborations you are a member of
  Collabs,
  /// List the newest jobs
  Jobs {
    #[arg(short = 'n', long, default_value_t = 20)]
    size: usize,
  },
  /// Show a single job
  Job { id: i64 },
  /// Print a job's log
  Log { id: i64 },
  /// Show the comments on a job
  Comments { id: i64 },
  /// Comment on a job
  Comment { id: i64, text: String },
  /// Submit a job from a JSON object of job fields
  Submit { json: String },
  /// Hide a job
  Hide { id: i64 },
  /// List the tags used in the collaboration
  Tags,
  /// Tag a job
  Tag { id: i64, tag: String },
  /// Remove a tag from a job
  Untag { id: i64, tag: String },
  /// Move a job's output data to another repository
  Repository { id: i64, repository: String },
  /// List projects
  Projects,
  /// Submit a project form (PUT updates, POST creates, DELETE deletes)
  Project { method: String, json: String },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let config = Config::load(args.config.as_deref())?;
  let _log_guard = jobq::logging::init(&config.log_level)?;

  let url = args.url.as_deref().unwrap_or(&config.server.url);
  let auth = Config::get_auth()?;
  let client = CachedQueueClient::new(QueueClient::connect(url)?);

  let collab = args.collab.or(config.default_collab);
  let collab = || {
    collab
      .clone()
      .ok_or_else(|| eyre!("No collaboration given. Pass --collab or set default_collab."))
  };

  match args.command {
    Command::Collabs => {
      for c in client.list_collabs(&auth).await? {
        println!("{}", c.name().unwrap_or("<unnamed>"));
      }
    }
    Command::Jobs { size } => {
      for job in client.query_jobs(&collab()?, &auth, size).await? {
        print_job(&job);
      }
    }
    Command::Job { id } => match client.get_job(id, &collab()?, &auth).await? {
      Some(job) => println!("{}", serde_json::to_string_pretty(&job)?),
      None => return Err(eyre!("Job {} not found", id)),
    },
    Command::Log { id } => print!("{}", client.get_log(id, &auth).await?),
    Command::Comments { id } => {
      for comment in client.get_comments(id, &auth).await? {
        println!("#{} {}", comment.id, comment.content);
      }
    }
    Command::Comment { id, text } => {
      let created = client
        .create_comment(id, &NewComment { content: text }, &auth)
        .await?;
      println!("comment #{} added", created.id);
    }
    Command::Submit { json } => {
      let job = client.create_job(&collab()?, parse_object(&json)?, &auth).await?;
      println!("job #{} submitted", job.id);
    }
    Command::Hide { id } => {
      client.hide_job(&collab()?, id, &auth).await?;
      println!("job #{} hidden", id);
    }
    Command::Tags => {
      for tag in client.query_tags(&collab()?, &auth).await? {
        println!("{}", tag);
      }
    }
    Command::Tag { id, tag } => client.add_tag(&collab()?, id, &tag, &auth).await?,
    Command::Untag { id, tag } => client.delete_tag(&collab()?, id, &tag, &auth).await?,
    Command::Repository { id, repository } => {
      let output = client
        .change_repository(&collab()?, id, &repository, &auth)
        .await?;
      println!(
        "output data now in {}",
        output.repository.as_deref().unwrap_or("<none>")
      );
    }
    Command::Projects => {
      for project in client.query_projects(&collab()?, &auth).await? {
        print_project(&project);
      }
    }
    Command::Project { method, json } => {
      let submission = FormSubmission {
        method: method
          .to_uppercase()
          .parse()
          .map_err(|e| eyre!("Invalid method {}: {}", method, e))?,
        collab: collab()?,
        body: parse_object(&json)?,
      };
      let action = update_project(&client, &auth, submission).await?;
      println!("{:?}", action);
    }
  }

  Ok(())
}

fn parse_object(json: &str) -> Result<Map<String, Value>> {
  match serde_json::from_str(json)? {
    Value::Object(map) => Ok(map),
    _ => Err(eyre!("Expected a JSON object")),
  }
}

fn print_job(job: &Job) {
  let status = job
    .status
    .map(|s| format!("{:?}", s).to_lowercase())
    .unwrap_or_else(|| "-".to_string());
  let tags = job.tags.as_deref().unwrap_or_default().join(",");
  println!("{:>8}  {:<10}  {}", job.id, status, tags);
}

fn print_project(project: &Project) {
  let submitted = project
    .submission_date
    .map(|d| d.to_string())
    .unwrap_or_else(|| "draft".to_string());
  let title = project
    .extra
    .get("title")
    .and_then(Value::as_str)
    .unwrap_or("");
  println!("{:>8}  {:<10}  {}", project.id, submitted, title);
}
