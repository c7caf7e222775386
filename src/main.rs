use std::{error::Error, process, str::FromStr, sync::Arc};

use clap::{command, Parser, Subcommand, ValueHint};
use log::{debug, error, LevelFilter};
use time::{macros::format_description, Date, Time};
use url::Url;
use veil::Redact;

use remdash::{
    config::Config,
    dashboard::Dashboard,
    local::{LocalData, NotificationKind},
    protocol::{
        meetings::{CreateMeeting, MeetingFilter},
        users::{Role, UpdateProfile, UserFilter},
    },
    session::FileStore,
};

/// Profile to display when not built in release mode.
#[cfg(debug_assertions)]
const BUILD_PROFILE: &str = "debug";
/// Profile to display when not built release mode.
#[cfg(not(debug_assertions))]
const BUILD_PROFILE: &str = "release";

/// Group name for mutually exclusive logging options.
const ARGS_GROUP_LOGGING: &str = "logging";

/// Command line arguments as parsed by `clap`.
#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Origin of the dashboard API
    #[arg(
        short,
        long,
        value_name = "URL",
        env = "REMDASH_BASE_URL",
        value_hint = ValueHint::Url,
        default_value_t = String::from("http://localhost:5000/api/")
    )]
    base_url: String,

    /// Session file
    ///
    /// Ensure that this file is kept secure and not shared publicly, as it
    /// contains tokens that grant access to your dashboard account.
    #[arg(long, value_name = "FILE", value_hint = ValueHint::FilePath, default_value_t = String::from(Config::DEFAULT_SESSION_FILE))]
    session_file: String,

    /// Local notes and notifications file
    #[arg(long, value_name = "FILE", value_hint = ValueHint::FilePath, default_value_t = String::from(Config::DEFAULT_DATA_FILE))]
    data_file: String,

    /// Suppresses all output except warnings and errors.
    #[arg(short, long, default_value_t = false, group = ARGS_GROUP_LOGGING)]
    quiet: bool,

    /// Enable verbose logging
    ///
    /// Specify twice for trace logging.
    #[arg(short, long, action = clap::ArgAction::Count, group = ARGS_GROUP_LOGGING)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

// Credentials are redacted so the startup argument dump stays safe to share.
#[derive(Clone, Subcommand, Redact)]
enum Command {
    /// Log in and store the session
    Login {
        username: String,

        #[redact]
        password: String,
    },

    /// Clear the stored session
    Logout,

    /// Show the authenticated user
    Whoami,

    /// Force a token refresh
    Refresh,

    /// Meeting operations
    Meetings {
        #[command(subcommand)]
        command: MeetingsCommand,
    },

    /// User management operations
    Users {
        #[command(subcommand)]
        command: UsersCommand,
    },

    /// Profile settings
    Profile {
        #[command(subcommand)]
        command: ProfileCommand,
    },

    /// Local notes
    Notes {
        #[command(subcommand)]
        command: NotesCommand,
    },

    /// Local notifications
    Notifications {
        #[command(subcommand)]
        command: NotificationsCommand,
    },
}

#[derive(Clone, Debug, Subcommand)]
enum MeetingsCommand {
    /// List meetings
    List {
        /// Filter by title substring
        #[arg(long)]
        search: Option<String>,

        /// Earliest date to include (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        from: Option<Date>,

        /// Latest date to include (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        to: Option<Date>,

        /// Only meetings today or later
        #[arg(long, default_value_t = false)]
        upcoming: bool,

        /// Only meetings before today
        #[arg(long, default_value_t = false)]
        past: bool,

        #[arg(long)]
        page: Option<usize>,

        #[arg(long)]
        per_page: Option<usize>,
    },

    /// Show one meeting
    Show { id: u64 },

    /// Create a meeting
    Create {
        title: String,

        /// Meeting date (YYYY-MM-DD)
        #[arg(value_parser = parse_date)]
        date: Date,

        /// Meeting time (HH:MM)
        #[arg(value_parser = parse_time)]
        time: Time,

        /// Attendee user ids
        #[arg(required = true)]
        attendees: Vec<u64>,
    },

    /// Delete a meeting
    Delete { id: u64 },
}

#[derive(Clone, Debug, Subcommand)]
enum UsersCommand {
    /// List user accounts
    List {
        /// Filter by name, username or email substring
        #[arg(long)]
        search: Option<String>,

        /// Filter by role (admin, dean, director, secretary)
        #[arg(long, value_parser = Role::from_str)]
        role: Option<Role>,

        #[arg(long)]
        page: Option<usize>,
    },

    /// Show one user account
    Show { id: u64 },

    /// Re-enable a user account
    Activate { id: u64 },

    /// Disable a user account
    Deactivate { id: u64 },

    /// Delete a user account
    Delete { id: u64 },
}

#[derive(Clone, Subcommand, Redact)]
enum ProfileCommand {
    /// Show the caller's profile
    Show,

    /// Update profile fields
    Update {
        #[arg(long)]
        first_name: Option<String>,

        #[arg(long)]
        last_name: Option<String>,

        #[arg(long)]
        address: Option<String>,

        #[arg(long)]
        university: Option<String>,
    },

    /// Change the account password
    Password {
        #[redact]
        current: String,

        #[redact]
        new: String,
    },
}

#[derive(Clone, Debug, Subcommand)]
enum NotesCommand {
    /// List notes, newest first
    List,

    /// Add a note
    Add { title: String, body: String },

    /// Rewrite a note
    Edit { id: u64, title: String, body: String },

    /// Remove a note
    Remove { id: u64 },
}

#[derive(Clone, Debug, Subcommand)]
enum NotificationsCommand {
    /// List notifications, newest first
    List,

    /// Mark one notification as read
    Read { id: u64 },

    /// Mark every notification as read
    ReadAll,

    /// Remove a notification
    Remove { id: u64 },
}

fn fmt_date(date: Option<Date>) -> String {
    let format = format_description!("[year]-[month]-[day]");
    date.and_then(|date| date.format(&format).ok())
        .unwrap_or_else(|| "----------".to_owned())
}

fn fmt_time(time: Option<Time>) -> String {
    let format = format_description!("[hour]:[minute]");
    time.and_then(|time| time.format(&format).ok())
        .unwrap_or_else(|| "--:--".to_owned())
}

fn parse_date(value: &str) -> Result<Date, String> {
    let format = format_description!("[year]-[month]-[day]");
    Date::parse(value, &format).map_err(|e| format!("invalid date \"{value}\": {e}"))
}

fn parse_time(value: &str) -> Result<Time, String> {
    let format = format_description!("[hour]:[minute]");
    Time::parse(value, &format).map_err(|e| format!("invalid time \"{value}\": {e}"))
}

/// Initializes the logger facade.
///
/// The logging level is determined as follows, in order of precedence from
/// highest to lowest:
/// 1. Command line arguments
/// 2. `RUST_LOG` environment variable
/// 3. Hard coded default
///
/// # Panics
///
/// Panics when a logger facade is already initialized.
fn init_logger(config: &Args) {
    let mut logger = env_logger::Builder::from_env(
        // Note: if you change the default logging level here, then you should
        // probably also change the verbosity levels below.
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    if config.quiet || config.verbose > 0 {
        let level = match config.verbose {
            0 => {
                // Quiet and verbose are mutually exclusive, and `verbose` is 0
                // by default. So this arm means: quiet mode.
                LevelFilter::Warn
            }
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        // Filter log messages of external crates.
        logger.filter_module("remdash", level);
    }

    logger.init();
}

/// Main application entry: dispatches one subcommand and exits.
///
/// # Errors
///
/// Returns an error when the API rejects an operation or local state cannot
/// be read or written.
#[expect(clippy::too_many_lines)]
async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let base_url = Url::parse(&args.base_url)?;
    let mut config = Config::new(base_url);
    config.session_file = args.session_file;
    config.data_file = args.data_file;

    let store = Arc::new(FileStore::open(&config.session_file)?);
    let dashboard = Dashboard::new(&config, store)?;

    match args.command {
        Command::Login { username, password } => {
            let user = dashboard.pipeline().login(&username, &password).await?;
            println!("logged in as {}", user.display_name());
        }

        Command::Logout => {
            dashboard.pipeline().logout();
            println!("logged out");
        }

        Command::Whoami => {
            let user = dashboard.pipeline().current_user().await?;
            print!("{} ({})", user.display_name(), user.username);
            if let Some(role) = user.role() {
                print!(", {role}");
            }
            println!();
        }

        Command::Refresh => {
            dashboard.pipeline().refresh().await?;
            println!("access token refreshed");
        }

        Command::Meetings { command } => match command {
            MeetingsCommand::List {
                search,
                from,
                to,
                upcoming,
                past,
                page,
                per_page,
            } => {
                let filter = MeetingFilter {
                    search,
                    date_from: from,
                    date_to: to,
                    upcoming,
                    past,
                    page,
                    per_page,
                    ..MeetingFilter::default()
                };
                let meetings = dashboard.meetings(&filter).await?;
                for meeting in &meetings.items {
                    let date = fmt_date(meeting.date);
                    let time = fmt_time(meeting.time);
                    println!(
                        "{:>5}  {date} {time}  {} ({} attendees)",
                        meeting.id,
                        meeting.title,
                        meeting.attendees.len()
                    );
                }
                let pagination = meetings.pagination;
                println!(
                    "page {}/{} ({} total)",
                    pagination.page, pagination.pages, pagination.total
                );
            }

            MeetingsCommand::Show { id } => {
                let meeting = dashboard.meeting(id).await?;
                println!("{}: {}", meeting.id, meeting.title);
                if meeting.date.is_some() {
                    println!("date: {}", fmt_date(meeting.date));
                }
                if meeting.time.is_some() {
                    println!("time: {}", fmt_time(meeting.time));
                }
                for attendee in &meeting.attendees {
                    println!(
                        "attendee: {} ({})",
                        attendee.full_name.as_deref().unwrap_or(&attendee.username),
                        attendee.id
                    );
                }
            }

            MeetingsCommand::Create {
                title,
                date,
                time,
                attendees,
            } => {
                let meeting = dashboard
                    .create_meeting(&CreateMeeting {
                        title,
                        date,
                        time,
                        attendee_ids: attendees,
                    })
                    .await?;
                println!("created meeting {}", meeting.id);

                // The dashboard surfaces newly scheduled meetings in the
                // notification list.
                let mut data = LocalData::open(&config.data_file)?;
                data.push_notification(
                    NotificationKind::Meeting,
                    "Meeting scheduled",
                    &format!("{} on {} at {}", meeting.title, fmt_date(meeting.date), fmt_time(meeting.time)),
                );
            }

            MeetingsCommand::Delete { id } => {
                dashboard.delete_meeting(id).await?;
                println!("deleted meeting {id}");
            }
        },

        Command::Users { command } => match command {
            UsersCommand::List { search, role, page } => {
                let filter = UserFilter {
                    search,
                    role,
                    page,
                    ..UserFilter::default()
                };
                let users = dashboard.users(&filter).await?;
                for user in &users.items {
                    let active = if user.is_active.unwrap_or(true) {
                        ""
                    } else {
                        " [disabled]"
                    };
                    print!("{:>5}  {} ({})", user.id, user.display_name(), user.username);
                    if let Some(role) = user.role() {
                        print!(", {role}");
                    }
                    println!("{active}");
                }
            }

            UsersCommand::Show { id } => {
                let user = dashboard.user(id).await?;
                println!("{}: {} ({})", user.id, user.display_name(), user.username);
                if let Some(email) = &user.email {
                    println!("email: {email}");
                }
                if let Some(role) = user.role() {
                    println!("role: {role}");
                }
            }

            UsersCommand::Activate { id } => {
                dashboard.set_user_active(id, true).await?;
                println!("activated user {id}");
            }

            UsersCommand::Deactivate { id } => {
                dashboard.set_user_active(id, false).await?;
                println!("deactivated user {id}");
            }

            UsersCommand::Delete { id } => {
                dashboard.delete_user(id).await?;
                println!("deleted user {id}");
            }
        },

        Command::Profile { command } => match command {
            ProfileCommand::Show => {
                let user = dashboard.profile().await?;
                println!("{} ({})", user.display_name(), user.username);
                if let Some(profile) = &user.profile {
                    if let Some(university) = &profile.university {
                        println!("university: {university}");
                    }
                    if let Some(address) = &profile.address {
                        println!("address: {address}");
                    }
                    if let Some(email) = &profile.email {
                        println!("email: {email}");
                    }
                }
            }

            ProfileCommand::Update {
                first_name,
                last_name,
                address,
                university,
            } => {
                let body = UpdateProfile {
                    first_name,
                    last_name,
                    address,
                    university,
                    ..UpdateProfile::default()
                };
                dashboard.update_profile(&body).await?;
                println!("profile updated");
            }

            ProfileCommand::Password { current, new } => {
                dashboard.change_password(&current, &new).await?;
                println!("password changed");
            }
        },

        Command::Notes { command } => {
            let mut data = LocalData::open(&config.data_file)?;
            match command {
                NotesCommand::List => {
                    for note in data.notes() {
                        println!("{:>5}  {}: {}", note.id, note.title, note.body);
                    }
                }
                NotesCommand::Add { title, body } => {
                    let id = data.add_note(&title, &body);
                    println!("added note {id}");
                }
                NotesCommand::Edit { id, title, body } => {
                    if data.edit_note(id, &title, &body) {
                        println!("updated note {id}");
                    } else {
                        return Err(format!("no note with id {id}").into());
                    }
                }
                NotesCommand::Remove { id } => {
                    if data.remove_note(id) {
                        println!("removed note {id}");
                    } else {
                        return Err(format!("no note with id {id}").into());
                    }
                }
            }
        }

        Command::Notifications { command } => {
            let mut data = LocalData::open(&config.data_file)?;
            match command {
                NotificationsCommand::List => {
                    for notification in data.notifications() {
                        let marker = if notification.read { " " } else { "*" };
                        println!(
                            "{marker}{:>4}  [{}] {}: {}",
                            notification.id,
                            notification.kind,
                            notification.title,
                            notification.message
                        );
                    }
                    println!("{} unread", data.unread_count());
                }
                NotificationsCommand::Read { id } => {
                    if data.mark_read(id) {
                        println!("marked notification {id} as read");
                    } else {
                        return Err(format!("no notification with id {id}").into());
                    }
                }
                NotificationsCommand::ReadAll => {
                    data.mark_all_read();
                    println!("marked all notifications as read");
                }
                NotificationsCommand::Remove { id } => {
                    if data.remove_notification(id) {
                        println!("removed notification {id}");
                    } else {
                        return Err(format!("no notification with id {id}").into());
                    }
                }
            }
        }
    }

    Ok(())
}

/// Main entry point of the application.
///
/// This function initializes the logger facade, parses the command line
/// arguments, and runs the selected subcommand.
#[tokio::main]
async fn main() {
    // `clap` handles our command line arguments and help text.
    let args = Args::parse();
    init_logger(&args);

    // Dump command line arguments before we do anything more.
    // This aids in debugging of whatever comes next.
    debug!("Command {:#?}", args);

    let cmd = command!();
    let name = cmd.get_name().to_string();
    let version = cmd.get_version().unwrap_or("UNKNOWN").to_string();

    debug!("starting {name}/{version}; {BUILD_PROFILE}");

    if let Err(e) = run(args).await {
        error!("{e}");
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_password_is_redacted_from_debug_output() {
        let command = Command::Login {
            username: "jdoe".to_owned(),
            password: "hunter22".to_owned(),
        };
        let debug = format!("{command:?}");
        assert!(debug.contains("jdoe"));
        assert!(!debug.contains("hunter22"));
    }

    #[test]
    fn password_change_arguments_are_redacted_from_debug_output() {
        let command = ProfileCommand::Password {
            current: "old-password".to_owned(),
            new: "new-password".to_owned(),
        };
        let debug = format!("{command:?}");
        assert!(!debug.contains("old-password"));
        assert!(!debug.contains("new-password"));
    }
}
